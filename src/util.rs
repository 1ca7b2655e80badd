/// Count whitespace-separated words, the same way for articles and versions.
pub fn word_count(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

/// Truncate to `max_chars` characters, marking the cut with `..`.
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("..");
    out
}

/// Split a comma-separated keyword list, dropping blanks.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

/// Locate the JSON object in an LM reply.
///
/// The first fenced block whose body is an object wins; otherwise the span from
/// the first `{` to the last `}`. Returns `None` when the reply has no object.
pub fn extract_json(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        // The info string (`json`, `JSON`, nothing) runs to the end of the line.
        let Some(body_start) = after.find('\n') else {
            break;
        };
        let body = &after[body_start + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        let candidate = body[..close].trim();
        if candidate.starts_with('{') && candidate.ends_with('}') {
            return Some(candidate);
        }
        rest = &body[close + 3..];
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
