/// Canonical form of a display name used in natural keys.
///
/// Trims, lowercases (Unicode aware) and collapses internal whitespace runs.
/// Accents and punctuation are kept: "Atlético" and "Atletico" stay distinct.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `text` with everything past `max` characters replaced by an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}
