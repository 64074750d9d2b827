/*
 * catalog.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error codes.
//!
//! Codes have the form `T-<subsystem>-<n>`: 0 is I/O, 1 is parsing and 2 is
//! rendering. The table lives in `error_catalog.json` and is embedded at
//! compile time.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCodeInfo {
    /// `io`, `parse` or `render`.
    pub subsystem: String,
    pub title: String,
    /// Suggested fix shown under the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// # Panics
///
/// On first access if the embedded table is not valid JSON.
pub static ERROR_CATALOG: Lazy<BTreeMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../error_catalog.json"))
        .expect("error_catalog.json is embedded at build time and must parse")
});

pub fn get_error_info(code: &str) -> Option<&'static ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

pub fn get_subsystem(code: &str) -> Option<&'static str> {
    get_error_info(code).map(|info| info.subsystem.as_str())
}

/// Codes of one subsystem, in order.
pub fn codes_in(subsystem: &str) -> impl Iterator<Item = &'static str> + '_ {
    ERROR_CATALOG
        .iter()
        .filter(move |(_, info)| info.subsystem == subsystem)
        .map(|(code, _)| code.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_codes() {
        let codes: Vec<_> = codes_in("parse").collect();
        assert_eq!(codes, vec!["T-1-1", "T-1-2", "T-1-3", "T-1-4", "T-1-5", "T-1-6", "T-1-7"]);
    }

    #[test]
    fn test_render_code_lookup() {
        let info = get_error_info("T-2-3").unwrap();
        assert_eq!(info.subsystem, "render");
        assert_eq!(info.title, "Partial stack overflow");
        assert!(info.hint.is_some());
        assert_eq!(get_subsystem("T-0-1"), Some("io"));
    }

    #[test]
    fn test_unknown_code() {
        assert!(get_error_info("T-999-1").is_none());
    }
}
