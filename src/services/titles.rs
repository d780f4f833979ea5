use serde::Serialize;

/// One selectable line of a title generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleCandidate {
    /// Full trimmed line, ordinal included. Stable cache key.
    pub key: String,
    /// Line with any leading `<digits>.` removed.
    pub label: String,
}

/// Remove a leading `<digits>.` marker and the whitespace after it.
pub fn strip_ordinal(line: &str) -> &str {
    let trimmed = line.trim();
    let digits = trimmed.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return trimmed;
    }
    match trimmed[digits..].strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    }
}

/// Split generated text into candidates, skipping blank lines.
pub fn parse_titles(text: &str) -> Vec<TitleCandidate> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| TitleCandidate {
            key: line.to_string(),
            label: strip_ordinal(line).to_string(),
        })
        .collect()
}
