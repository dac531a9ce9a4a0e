// Content script driver
//
// Wires browser events to the core watcher and scanner:
//   MutationObserver  -> ChangeWatcher::notify_mutation
//   location polling  -> ChangeWatcher::notify_url
//   fallback interval -> ChangeWatcher::fallback
//   refreshMappings   -> reload + ChangeWatcher::refresh
// Scans run in slices, one per animation frame.

mod dom;
mod page_context;

use crate::chrome::{self, from_js, to_js};
use dom::WebDom;
use gloo_timers::callback::{Interval, Timeout};
use mapper_core::watcher::is_relevant_addition;
use mapper_core::{ExtensionMessage, RuntimeRequest, ScanRequest, SliceOutcome};
use page_context::PageContext;
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{MutationObserver, MutationObserverInit, MutationRecord, Window};

/// Set on `window` once a content script instance is running.
const LOADED_FLAG: &str = "__addressMapperLoaded";

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

/// Returns true if another instance already claimed this page.
fn claim_page(window: &Window) -> Result<bool, JsValue> {
    let flag = JsValue::from_str(LOADED_FLAG);
    if js_sys::Reflect::get(window, &flag)?.is_truthy() {
        return Ok(true);
    }
    js_sys::Reflect::set(window, &flag, &JsValue::TRUE)?;
    Ok(false)
}

pub fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    if claim_page(&window)? {
        log::debug!("Content script already running on this page");
        return Ok(());
    }
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document"))?;

    let config = crate::config();
    let page = PageContext::new(WebDom::new(document.clone()), config);
    listen_for_messages(page.clone());

    spawn_local(async move {
        page.reload().await;
        if let Ok(href) = window.location().href() {
            page.watcher.borrow_mut().notify_url(now_ms(), &href);
        }
        let initial = page.watcher.borrow_mut().refresh();
        if let Some(request) = initial {
            run_scan(page.clone(), request).await;
        }

        if let Some(body) = document.body() {
            if let Err(e) = observe_mutations(&page, &body) {
                log::error!("MutationObserver setup failed: {:?}", e);
            }
        }
        start_timers(&page, window, config);
        log::info!("Address mapper active");
    });
    Ok(())
}

async fn next_frame() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if window.request_animation_frame(&resolve).is_err() {
            let _ = resolve.call0(&JsValue::UNDEFINED);
        }
    });
    JsFuture::from(promise).await.map(|_| ())
}

async fn run_scan(page: PageContext, request: ScanRequest) {
    log::debug!("Scan started: {:?}", request);
    if request.reset_markers {
        page.session.borrow().reset_markers(&*page.dom);
    }

    let mut task = page.session.borrow().begin_scan(&*page.dom);
    loop {
        let outcome = page.session.borrow().run_slice(&*page.dom, &mut task);
        match outcome {
            SliceOutcome::Done(report) => {
                log::debug!("Scan finished: {:?}", report);
                break;
            }
            SliceOutcome::Pending => {
                if let Err(e) = next_frame().await {
                    log::warn!("Animation frame unavailable: {:?}", e);
                }
            }
        }
    }

    page.watcher.borrow_mut().finish(now_ms());
    arm_debounce(&page);
}

/// (Re)start the timer for the watcher's scheduled scan, if any.
fn arm_debounce(page: &PageContext) {
    let state = page.watcher.borrow().state();
    let mapper_core::WatchState::ScanScheduled { due_at } = state else {
        return;
    };
    let delay = due_at.saturating_sub(now_ms()).min(u32::MAX as u64) as u32;
    let ctx = page.clone();
    page.set_debounce(Some(Timeout::new(delay, move || on_debounce_elapsed(ctx))));
}

fn on_debounce_elapsed(page: PageContext) {
    let due = page.watcher.borrow_mut().due(now_ms());
    match due {
        Some(request) => spawn_local(run_scan(page, request)),
        None => arm_debounce(&page),
    }
}

fn observe_mutations(page: &PageContext, body: &web_sys::HtmlElement) -> Result<(), JsValue> {
    let ctx = page.clone();
    let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _observer: JsValue| {
        let relevant = records.iter().any(|record| {
            let Ok(record) = record.dyn_into::<MutationRecord>() else {
                return false;
            };
            let added = record.added_nodes();
            (0..added.length())
                .filter_map(|i| added.get(i))
                .any(|node| is_relevant_addition(&*ctx.dom, &node))
        });
        if relevant {
            ctx.watcher.borrow_mut().notify_mutation(now_ms());
            arm_debounce(&ctx);
        }
    }) as Box<dyn FnMut(js_sys::Array, JsValue)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    observer.observe_with_options(body, &options)?;

    // Both live for the page lifetime
    callback.forget();
    std::mem::forget(observer);
    Ok(())
}

fn start_timers(page: &PageContext, window: Window, config: &mapper_core::MapperConfig) {
    let ctx = page.clone();
    Interval::new(config.watcher.fallback_interval_ms as u32, move || {
        let active = ctx.session.borrow().is_active();
        let request = ctx.watcher.borrow_mut().fallback(active);
        if let Some(request) = request {
            spawn_local(run_scan(ctx.clone(), request));
        }
    })
    .forget();

    let ctx = page.clone();
    Interval::new(config.watcher.url_poll_ms as u32, move || {
        let Ok(href) = window.location().href() else {
            return;
        };
        let navigated = ctx.watcher.borrow_mut().notify_url(now_ms(), &href);
        if navigated {
            arm_debounce(&ctx);
        }
    })
    .forget();
}

fn listen_for_messages(page: PageContext) {
    let callback = Closure::wrap(Box::new(
        move |message: JsValue, _sender: JsValue, send_response: js_sys::Function| -> JsValue {
            let parsed = from_js::<Value>(&message)
                .map_err(|e| log::debug!("Unreadable message: {:?}", e))
                .ok()
                .and_then(|value| match ExtensionMessage::from_value(&value) {
                    Ok(msg) => Some(msg),
                    Err(e) => {
                        log::debug!("Ignoring message: {}", e);
                        None
                    }
                });

            match parsed {
                Some(ExtensionMessage::RefreshMappings) => {
                    let page = page.clone();
                    spawn_local(async move {
                        page.reload().await;
                        let request = page.watcher.borrow_mut().refresh();
                        if let Some(request) = request {
                            run_scan(page.clone(), request).await;
                        }
                        if let Ok(reply) = to_js(&json!({ "success": true })) {
                            let _ = send_response.call1(&JsValue::UNDEFINED, &reply);
                        }
                    });
                    JsValue::TRUE
                }
                Some(ExtensionMessage::Request(RuntimeRequest::CopyToClipboard { text })) => {
                    spawn_local(async move {
                        match chrome::clipboard::write_text(&text).await {
                            Ok(()) => log::info!("Copied {} to clipboard", text),
                            Err(e) => log::warn!("Clipboard write failed: {}", chrome::error_text(&e)),
                        }
                    });
                    JsValue::FALSE
                }
                Some(ExtensionMessage::Request(RuntimeRequest::StorageChanged { changes })) => {
                    log::debug!("Storage changed: {}", changes);
                    JsValue::FALSE
                }
                Some(ExtensionMessage::Request(other)) => {
                    log::debug!("Not handled here: {:?}", other);
                    JsValue::FALSE
                }
                None => JsValue::FALSE,
            }
        },
    )
        as Box<dyn FnMut(JsValue, JsValue, js_sys::Function) -> JsValue>);

    chrome::runtime::on_message(callback.as_ref().unchecked_ref());
    callback.forget();
}
