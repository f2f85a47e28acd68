//! Text normalization ahead of plate matching

/// Delete every character that is not an ASCII letter or digit.
///
/// Characters are removed, never replaced, so plate slots line up against the
/// filtered text only. Case is left untouched.
pub fn normalize(text: &str) -> String {
    text.chars().filter(char::is_ascii_alphanumeric).collect()
}
