#![forbid(unsafe_code)]

/// Case-folds identifying text before hashing.
///
/// Only the case changes. No trimming and no Unicode normalization, so the
/// digest stays bit-compatible with what ad platforms compute on their side.
pub fn canonicalize(text: &str) -> String {
    text.to_lowercase()
}
