//! Extension based categorization

use crate::config::{MediaTypeRule, normalize_extension};

/// Category directory for an extension, or `None` when no rule claims it
///
/// The extension is compared case-insensitively and may carry a leading
/// dot. Rules are checked in configured order and the first match wins.
pub fn classify<'a>(extension: &str, rules: &'a [MediaTypeRule]) -> Option<&'a str> {
    let ext = normalize_extension(extension);
    if ext.is_empty() {
        return None;
    }

    rules
        .iter()
        .find(|rule| rule.matches(&ext))
        .map(|rule| rule.directory.as_str())
}
