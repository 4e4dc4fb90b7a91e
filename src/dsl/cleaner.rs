use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?i:json)?\s*(.*?)```").expect("fenced block pattern is valid")
});

/// Isolates the most likely JSON object inside a model response.
///
/// Takes the first fenced code block when one exists, then slices from the
/// first `{` to the last `}`. Input without a brace pair comes back trimmed
/// but otherwise untouched, so the caller's strict parse reports the failure.
pub fn clean_response(raw: &str) -> String {
    let text = match FENCED_BLOCK.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw,
    };
    slice_object(text.trim()).trim().to_string()
}

/// Whether `text` holds anything that could open a JSON object.
pub fn has_object_braces(text: &str) -> bool {
    matches!((text.find('{'), text.rfind('}')), (Some(start), Some(end)) if start < end)
}

fn slice_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}
