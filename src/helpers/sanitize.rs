use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_NAME_LEN: usize = 200;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("Invalid regex"));

/// Strips characters that are not allowed in file names on common file
/// systems and truncates the result to [`MAX_NAME_LEN`] characters.
pub fn sanitize_name(name: &str) -> String {
    DISALLOWED
        .replace_all(name, "")
        .chars()
        .take(MAX_NAME_LEN)
        .collect()
}

/// A single path component derived from `name`, never empty and never `.`
/// or `..`.
pub fn path_component(name: &str, fallback: &str) -> String {
    let clean = sanitize_name(name);
    let clean = clean.trim();

    if clean.trim_matches('.').is_empty() {
        return sanitize_name(fallback);
    }

    clean.to_string()
}

/// `{stem}.{ext}` with the stem cut short so the extension always survives
/// the length limit.
pub fn file_name(stem: &str, ext: &str, fallback: &str) -> String {
    suffixed_file_name(stem, "", ext, fallback)
}

/// Like [`file_name`] with ` ({n})` after the stem; both the counter and the
/// extension survive the length limit.
pub fn numbered_file_name(stem: &str, n: usize, ext: &str, fallback: &str) -> String {
    suffixed_file_name(stem, &format!(" ({n})"), ext, fallback)
}

fn suffixed_file_name(stem: &str, suffix: &str, ext: &str, fallback: &str) -> String {
    let ext = sanitize_name(ext);
    let budget = MAX_NAME_LEN.saturating_sub(ext.chars().count() + suffix.chars().count() + 1);
    let stem: String = path_component(stem, fallback).chars().take(budget).collect();

    format!("{}{suffix}.{ext}", stem.trim_end())
}
