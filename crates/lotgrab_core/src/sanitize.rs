use unicode_normalization::UnicodeNormalization;

/// Fallback for lot titles and file names that sanitize to nothing.
pub const UNTITLED_ITEM: &str = "untitled";
/// Fallback for the top-level folder name.
pub const UNTITLED_FOLDER: &str = "Untitled-Auction";

/// Safe path segment for a lot title or file name.
pub fn sanitize_name(input: &str) -> String {
    sanitize_with_fallback(input, UNTITLED_ITEM)
}

/// Safe path segment for the base download folder.
pub fn sanitize_folder_name(input: &str) -> String {
    sanitize_with_fallback(input, UNTITLED_FOLDER)
}

fn sanitize_with_fallback(input: &str, fallback: &str) -> String {
    let cleaned: String = input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if is_forbidden(c) { ' ' } else { c })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '\0'..='\u{1F}'
    )
}
