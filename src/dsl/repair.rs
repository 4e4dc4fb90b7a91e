use once_cell::sync::Lazy;
use regex::Regex;

use crate::dsl::cleaner::clean_response;

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern is valid"));
static LEADING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{\[])\s*,").expect("leading comma pattern is valid"));
static BARE_BACKSLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(\w)").expect("bare backslash pattern is valid"));

/// A run of the text either inside a string literal (quotes included) or
/// between string literals.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Bare(&'a str),
    Quoted(&'a str),
}

/// Best-effort repair of near-JSON model output.
///
/// Only called after a strict parse has failed; the result must still pass a
/// strict parse before anything trusts it. Every rule leaves valid JSON
/// untouched, so repairing already-clean text is a no-op.
pub fn repair_json(text: &str) -> String {
    let extracted = clean_response(text);
    let repaired: String = split_segments(&extracted)
        .into_iter()
        .map(|segment| match segment {
            Segment::Quoted(quoted) => escape_stray_backslashes(&normalize_control_chars(quoted)),
            Segment::Bare(bare) => {
                drop_bare_backslashes(&strip_leading_commas(&strip_trailing_commas(bare)))
            }
        })
        .collect();
    repaired.trim().to_string()
}

fn split_segments(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        match (in_string, bytes[i]) {
            (false, b'"') => {
                if start < i {
                    segments.push(Segment::Bare(&text[start..i]));
                }
                start = i;
                in_string = true;
            }
            // The escaped byte can never close the literal.
            (true, b'\\') => i += 1,
            (true, b'"') => {
                segments.push(Segment::Quoted(&text[start..=i]));
                start = i + 1;
                in_string = false;
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        let rest = &text[start..];
        segments.push(if in_string { Segment::Quoted(rest) } else { Segment::Bare(rest) });
    }
    segments
}

/// Raw tabs and newlines are illegal inside string literals.
fn normalize_control_chars(quoted: &str) -> String {
    quoted
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn strip_trailing_commas(bare: &str) -> String {
    replace_until_stable(&TRAILING_COMMA, bare)
}

fn strip_leading_commas(bare: &str) -> String {
    replace_until_stable(&LEADING_COMMA, bare)
}

fn replace_until_stable(pattern: &Regex, text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = pattern.replace_all(&current, "$1").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Doubles every backslash inside a literal that does not start a valid JSON
/// escape, so `"\d+"` becomes `"\\d+"` and decodes to the regex `\d+`.
fn escape_stray_backslashes(quoted: &str) -> String {
    let chars: Vec<char> = quoted.chars().collect();
    let mut out = String::with_capacity(quoted.len() + 4);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }
        if starts_valid_escape(&chars[i + 1..]) {
            out.push(c);
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push_str("\\\\");
            i += 1;
        }
    }
    out
}

fn starts_valid_escape(rest: &[char]) -> bool {
    match rest.first() {
        Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => true,
        Some('u') => rest.len() >= 5 && rest[1..5].iter().all(char::is_ascii_hexdigit),
        _ => false,
    }
}

/// Backslashes never belong between literals; keep the character they precede.
fn drop_bare_backslashes(bare: &str) -> String {
    BARE_BACKSLASH.replace_all(bare, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parses(text: &str) -> Value {
        serde_json::from_str(text).unwrap_or_else(|err| panic!("`{text}` did not parse: {err}"))
    }

    #[test]
    fn unescaped_regex_backslash_is_doubled() {
        let broken = r#"{"title":"T","fields":[{"name":"a","label":"A","type":"text","validation":{"pattern":"\d+"}}]}"#;
        assert!(serde_json::from_str::<Value>(broken).is_err());

        let value = parses(&repair_json(broken));
        assert_eq!(value["fields"][0]["validation"]["pattern"], r"\d+");
    }

    #[test]
    fn trailing_commas_are_removed() {
        let value = parses(&repair_json(r#"{"title":"T","fields":[] ,}"#));
        assert_eq!(value["title"], "T");

        let value = parses(&repair_json(r#"{"a": [1, 2, ], "b": {"c": 3,},}"#));
        assert_eq!(value["a"], serde_json::json!([1, 2]));
        assert_eq!(value["b"]["c"], 3);
    }

    #[test]
    fn leading_commas_are_removed() {
        let value = parses(&repair_json(r#"{ , , "a": [ , 1]}"#));
        assert_eq!(value["a"], serde_json::json!([1]));
    }

    #[test]
    fn raw_newlines_inside_strings_become_spaces() {
        let value = parses(&repair_json("{\"label\": \"First\nName\tHere\"}"));
        assert_eq!(value["label"], "First Name Here");
    }

    #[test]
    fn commas_inside_strings_are_left_alone() {
        let text = repair_json(r#"{"label": "a, }", "x": 1,}"#);
        assert_eq!(parses(&text)["label"], "a, }");
    }

    #[test]
    fn valid_escapes_survive_repair() {
        let broken = r#"{"hint": "line\nbreak \"quoted\" \u00e9", "pattern": "\w+@\w+\.com",}"#;
        let value = parses(&repair_json(broken));
        assert_eq!(value["hint"], "line\nbreak \"quoted\" é");
        assert_eq!(value["pattern"], r"\w+@\w+\.com");
    }

    #[test]
    fn backslashes_between_literals_are_dropped() {
        let value = parses(&repair_json(r#"{"a": \1, "b": 2}"#));
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn strict_json_is_returned_unchanged() {
        let pretty = "{\n  \"title\": \"Paths\",\n  \"path\": \"C:\\\\Users\\\\me\",\n  \"items\": [\n    1,\n    2\n  ]\n}";
        assert_eq!(repair_json(pretty), pretty);
    }

    #[test]
    fn fenced_input_is_extracted_before_repair() {
        let value = parses(&repair_json("Here you go\n```json\n{\"a\": [1,],}\n```"));
        assert_eq!(value["a"], serde_json::json!([1]));
    }

    #[test]
    fn unterminated_string_does_not_panic() {
        let repaired = repair_json("{\"a\": \"open \\");
        assert!(repaired.starts_with('{'));
    }

    #[test]
    fn segments_respect_escaped_quotes() {
        let segments = split_segments(r#"{"a\"b": 1}"#);
        assert_eq!(
            segments,
            vec![
                Segment::Bare("{"),
                Segment::Quoted(r#""a\"b""#),
                Segment::Bare(": 1}"),
            ]
        );
    }
}
