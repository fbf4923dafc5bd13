//! Post-processing for generated conversation titles.

/// Truncate at a word boundary when the text exceeds `max_length` chars.
///
/// The boundary must fall in the last 40% of the budget; otherwise the
/// text is hard-truncated with room for the ellipsis.
pub fn truncate_at_word_boundary(text: &str, max_length: usize) -> String {
    if max_length == 0 {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_length {
        return text.to_string();
    }

    let truncated = &chars[..max_length];
    let boundary = truncated.iter().rposition(|c| *c == ' ');
    match boundary {
        Some(pos) if pos as f64 > max_length as f64 * 0.6 => {
            let kept: String = truncated[..pos].iter().collect();
            format!("{kept}...")
        }
        _ => {
            let kept: String = chars[..max_length.saturating_sub(3)].iter().collect();
            format!("{kept}...")
        }
    }
}

/// Strip surrounding whitespace and one pair of matching outer quotes,
/// then truncate to `max_length`.
pub fn clean_title(title: &str, max_length: usize) -> String {
    let cleaned = title.trim();
    if cleaned.is_empty() {
        return String::new();
    }

    let cleaned = strip_outer_quotes(cleaned);
    truncate_at_word_boundary(cleaned, max_length)
}

fn strip_outer_quotes(text: &str) -> &str {
    if text.chars().count() < 2 {
        return text;
    }
    for quote in ['"', '\''] {
        if text.starts_with(quote) && text.ends_with(quote) {
            return &text[quote.len_utf8()..text.len() - quote.len_utf8()];
        }
    }
    text
}
