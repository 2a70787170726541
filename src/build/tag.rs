//! Image tag templates

use uuid::Uuid;

/// Length of the random tag used when the inputs could not be fingerprinted
const FALLBACK_TAG_LEN: usize = 7;

/// Docker tags are at most 128 characters
const MAX_TAG_LEN: usize = 128;

/// Expand `{hash}`, `{profile}` and `{name}` in a tag template.
///
/// Characters Docker does not accept in a tag become `-`.
pub fn resolve_tag(template: &str, hash: &str, profile: &str, name: &str) -> String {
    let expanded = template
        .replace("{hash}", hash)
        .replace("{profile}", profile)
        .replace("{name}", name);
    sanitize(&expanded)
}

/// Random short tag
pub fn fallback_tag() -> String {
    Uuid::new_v4().simple().to_string()[..FALLBACK_TAG_LEN].to_string()
}

fn sanitize(tag: &str) -> String {
    let mut out: String = tag
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_TAG_LEN)
        .collect();

    // Tags may not start with '.' or '-'
    if out.starts_with(|c| c == '.' || c == '-') {
        out.replace_range(..1, "_");
    }
    if out.is_empty() {
        out = "latest".to_string();
    }
    out
}
