// Wallet address shapes as they appear on explorer pages
// Canonical form: "0x" + 40 lower-case hex characters

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref FULL_ADDRESS: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap();
    static ref SHORT_ADDRESS: Regex =
        Regex::new(r"^(0x[0-9a-fA-F]{6,10})(?:\.{3}|…)([0-9a-fA-F]{6,10})$").unwrap();
    static ref LINK_ADDRESS: Regex =
        Regex::new(r"(?i)address/(0x[0-9a-f]{40})(?:[^0-9a-z]|$)").unwrap();
    static ref EMBEDDED_ADDRESS: Regex = Regex::new(r"(?i)\b0x[0-9a-f]{40}\b").unwrap();
}

/// A canonical, lower-cased wallet address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse a full address, ignoring surrounding whitespace and letter case.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if FULL_ADDRESS.is_match(trimmed) {
            Some(Self(trimmed.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234...abcd`, used where space is tight.
    pub fn abbreviate(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shortened display form, e.g. `0xabcdef12...3456789a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortAddress {
    head: String,
    tail: String,
}

impl ShortAddress {
    pub fn parse(input: &str) -> Option<Self> {
        let caps = SHORT_ADDRESS.captures(input.trim())?;
        Some(Self {
            head: caps[1].to_ascii_lowercase(),
            tail: caps[2].to_ascii_lowercase(),
        })
    }

    /// Whether `full` is consistent with the visible head and tail.
    pub fn matches(&self, full: &Address) -> bool {
        full.as_str().starts_with(&self.head) && full.as_str().ends_with(&self.tail)
    }
}

/// What an element's visible text says about an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayedAddress {
    Full(Address),
    Short(ShortAddress),
}

impl DisplayedAddress {
    pub fn parse(text: &str) -> Option<Self> {
        Address::parse(text)
            .map(Self::Full)
            .or_else(|| ShortAddress::parse(text).map(Self::Short))
    }
}

/// Extract the address embedded in an explorer link such as `/address/0x…`.
pub fn find_in_link(href: &str) -> Option<Address> {
    LINK_ADDRESS
        .captures(href)
        .and_then(|caps| Address::parse(&caps[1]))
}

/// First full address appearing anywhere in `text`.
pub fn find_first(text: &str) -> Option<Address> {
    EMBEDDED_ADDRESS
        .find(text)
        .and_then(|m| Address::parse(m.as_str()))
}

/// Every full address in `text` with its byte range.
pub fn find_all(text: &str) -> Vec<(std::ops::Range<usize>, Address)> {
    EMBEDDED_ADDRESS
        .find_iter(text)
        .filter_map(|m| Address::parse(m.as_str()).map(|a| (m.range(), a)))
        .collect()
}
