// Lucide icon components for Dioxus
// SVG icons inlined for better performance

use dioxus::prelude::*;

#[component]
fn Icon(class: Option<String>, children: Element) -> Element {
    rsx! {
        svg {
            class: "{class.unwrap_or_default()}",
            xmlns: "http://www.w3.org/2000/svg",
            width: "24",
            height: "24",
            view_box: "0 0 24 24",
            fill: "none",
            stroke: "currentColor",
            stroke_width: "2",
            stroke_linecap: "round",
            stroke_linejoin: "round",
            {children}
        }
    }
}

#[component]
pub fn Upload(class: Option<String>) -> Element {
    rsx! {
        Icon { class,
            path { d: "M21 15v4a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2v-4" }
            polyline { points: "17 8 12 3 7 8" }
            line { x1: "12", x2: "12", y1: "3", y2: "15" }
        }
    }
}

#[component]
pub fn Download(class: Option<String>) -> Element {
    rsx! {
        Icon { class,
            path { d: "M21 15v4a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2v-4" }
            polyline { points: "7 10 12 15 17 10" }
            line { x1: "12", x2: "12", y1: "15", y2: "3" }
        }
    }
}

#[component]
pub fn Plus(class: Option<String>) -> Element {
    rsx! {
        Icon { class,
            path { d: "M5 12h14" }
            path { d: "M12 5v14" }
        }
    }
}

#[component]
pub fn Trash(class: Option<String>) -> Element {
    rsx! {
        Icon { class,
            path { d: "M3 6h18" }
            path { d: "M19 6v14c0 1-1 2-2 2H7c-1 0-2-1-2-2V6" }
            path { d: "M8 6V4c0-1 1-2 2-2h4c1 0 2 1 2 2v2" }
        }
    }
}

#[component]
pub fn X(class: Option<String>) -> Element {
    rsx! {
        Icon { class,
            path { d: "M18 6 6 18" }
            path { d: "m6 6 12 12" }
        }
    }
}

#[component]
pub fn Tag(class: Option<String>) -> Element {
    rsx! {
        Icon { class,
            path { d: "M12.586 2.586A2 2 0 0 0 11.172 2H4a2 2 0 0 0-2 2v7.172a2 2 0 0 0 .586 1.414l8.704 8.704a2.426 2.426 0 0 0 3.42 0l6.58-6.58a2.426 2.426 0 0 0 0-3.42z" }
            circle { cx: "7.5", cy: "7.5", r: ".5", fill: "currentColor" }
        }
    }
}
