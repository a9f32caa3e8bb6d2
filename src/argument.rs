//! Argument markup handling
//!
//! Debaters wrap the argument they want the judge to read in
//! `<argument>...</argument>`; everything outside the tags is scratch work.

pub const ARGUMENT_OPEN: &str = "<argument>";
pub const ARGUMENT_CLOSE: &str = "</argument>";

/// Pull the argument out of a raw completion.
///
/// Text between the first open tag and the next close tag. A missing close
/// tag takes the rest of the text; a missing open tag takes the whole text.
pub fn extract_argument(response: &str) -> String {
    let Some(start) = response.find(ARGUMENT_OPEN) else {
        return response.trim().to_string();
    };
    let body = &response[start + ARGUMENT_OPEN.len()..];
    let end = body.find(ARGUMENT_CLOSE).unwrap_or(body.len());
    body[..end].trim().to_string()
}

/// Whether the text carries argument markup at all
pub fn has_argument_markup(response: &str) -> bool {
    response.contains(ARGUMENT_OPEN)
}

/// Validity predicate handed to the completion service
pub fn is_valid_argument(response: &str) -> bool {
    let Some(start) = response.find(ARGUMENT_OPEN) else {
        return false;
    };
    let body = &response[start + ARGUMENT_OPEN.len()..];
    match body.find(ARGUMENT_CLOSE) {
        Some(end) => !body[..end].trim().is_empty(),
        None => false,
    }
}

/// Keep at most `limit` words, preserving the original spacing of what is kept
pub fn truncate_words(text: &str, limit: usize) -> String {
    if limit == 0 {
        return String::new();
    }
    let mut seen = 0;
    let mut in_word = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                in_word = false;
                if seen == limit {
                    return text[..idx].to_string();
                }
            }
        } else if !in_word {
            in_word = true;
            seen += 1;
        }
    }
    text.to_string()
}
