// ABOUTME: Human readable usage notes for template functions
// ABOUTME: Looks function names up in a YAML document bundled into the binary

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::error::Result;

const TEMPLATE_USAGE: &str = include_str!("data/template_usage.yaml");

static USAGE: Lazy<HashMap<String, String>> = Lazy::new(|| load_usage().unwrap_or_default());

pub fn load_usage() -> Result<HashMap<String, String>> {
    Ok(serde_yaml::from_str(TEMPLATE_USAGE)?)
}

/// Usage text for `name`, or an empty string when undocumented.
pub fn func_usage(name: &str) -> String {
    USAGE.get(name).cloned().unwrap_or_default()
}
