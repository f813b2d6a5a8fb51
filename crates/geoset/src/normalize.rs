use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold a name for comparison: decompose, drop diacritics, lowercase.
///
/// `"Petite Île"` and `"petite ile"` both fold to `"petite ile"`.
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
