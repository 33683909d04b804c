use chrono::{DateTime, NaiveDate};

/// Calendar format used for normalized dates (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Strip markup tags from an excerpt, decode the common HTML entities and
/// collapse runs of whitespace.
///
/// A `<` only opens a tag when a name, `/`, `!` or `?` follows it and a `>`
/// closes it later; any other `<` is text. `&lt;` and `&gt;` stay encoded so
/// decoding never produces markup.
pub fn sanitize_excerpt(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        let tail = &rest[open..];
        let opens_tag = tail[1..]
            .starts_with(|c: char| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        match tail.find('>').filter(|_| opens_tag) {
            Some(close) => {
                text.push_str(&rest[..open]);
                rest = &tail[close + 1..];
            }
            None => {
                text.push_str(&rest[..=open]);
                rest = &tail[1..];
            }
        }
    }
    text.push_str(rest);

    let decoded = decode_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        // Entities are short; anything longer is a literal ampersand
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code).filter(|c| !matches!(c, '<' | '>'))
        }
    }
}

/// Parse a content date such as `2023-01-05`, `2023/1/5` or
/// `2023-01-05T10:30:00Z`. Only the calendar date is kept.
pub fn parse_content_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    let date_part = trimmed.split(['T', ' ']).next()?.replace('-', "/");
    NaiveDate::parse_from_str(&date_part, "%Y/%m/%d").ok()
}

/// Normalize a content date to `YYYY-MM-DD`.
/// Input that does not look like a date is returned unchanged.
pub fn normalize_date(raw: &str) -> String {
    match parse_content_date(raw) {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
