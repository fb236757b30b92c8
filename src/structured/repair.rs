//! Text-level helpers for pulling JSON out of generative output.
//!
//! All functions are pure and total: they never fail, they only return a
//! best-effort candidate for the next parse attempt.

use once_cell::sync::Lazy;
use regex::Regex;

static OPENING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?$").expect("static regex"));

static CLOSING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[ \t]*\r?$").expect("static regex"));

/// Return the body of the outermost markdown code block, or the input unchanged.
///
/// Fences count only when they sit on a line of their own, so backticks inside
/// JSON string values are never mistaken for block boundaries. The block runs
/// from the first opening fence to the last closing fence after it; an
/// unterminated block (truncated output) yields everything after the fence.
pub fn strip_code_fences(text: &str) -> &str {
    let Some(open) = OPENING_FENCE.find(text) else {
        return text.trim();
    };
    let start = match text[open.end()..].strip_prefix('\n') {
        Some(_) => open.end() + 1,
        None => open.end(),
    };
    match CLOSING_FENCE.find_iter(&text[start..]).last() {
        Some(close) => text[start..start + close.start()].trim(),
        None => text[start..].trim(),
    }
}

/// Return the first balanced `{...}` span. Braces inside string literals are
/// ignored. If the object never closes, the rest of the text from the opening
/// brace is returned so truncated output can still be repaired.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

/// Apply the common textual repairs, outside string literals only:
/// drop trailing commas before `}`/`]`, quote bare object keys, close an
/// unterminated string and append missing closing brackets.
pub fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                expect_key = false;
                out.push(c);
            }
            '{' | '[' => {
                stack.push(if c == '{' { '}' } else { ']' });
                expect_key = c == '{';
                out.push(c);
            }
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
                expect_key = false;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some('}') | Some(']') | None) {
                    i += 1;
                    continue;
                }
                expect_key = stack.last() == Some(&'}');
                out.push(c);
            }
            c if expect_key && (c.is_ascii_alphabetic() || c == '_') => {
                let end = chars[i..]
                    .iter()
                    .position(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
                    .map_or(chars.len(), |p| i + p);
                let ident: String = chars[i..end].iter().collect();
                let followed_by_colon = chars[end..]
                    .iter()
                    .find(|c| !c.is_whitespace())
                    .is_some_and(|c| *c == ':');
                if followed_by_colon {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                expect_key = false;
                i = end;
                continue;
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                expect_key = false;
                out.push(c);
            }
        }
        i += 1;
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    if !stack.is_empty() {
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        if out.ends_with(',') {
            out.pop();
        } else if out.ends_with(':') {
            out.push_str("null");
        }
        while let Some(closer) = stack.pop() {
            out.push(closer);
        }
    }
    out
}
