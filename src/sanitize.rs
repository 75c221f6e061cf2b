/// Lowercases `text`, turns every run of whitespace (line breaks included)
/// into a single space and trims both ends.
///
/// Applying it twice gives the same result as applying it once.
pub fn sanitize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
