//! Lightweight script-based language detection for reporter messages.
//!
//! Reporters write Arabic or English. Counts Arabic-script letters against
//! all letters; no dictionaries, no external dependencies.

use crate::models::enums::Language;

/// Share of letters that must be Arabic script to classify as Arabic.
/// Mixed messages (Arabic with English disease names) stay Arabic.
const ARABIC_RATIO_THRESHOLD: f64 = 0.3;

/// Detect the primary language of a message.
/// Empty text, or text without letters, is `Unknown`.
pub fn detect_language(text: &str) -> Language {
    let (letters, arabic) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(letters, arabic), c| {
            (letters + 1, arabic + usize::from(is_arabic_letter(c)))
        });

    if letters == 0 {
        return Language::Unknown;
    }

    if arabic as f64 / letters as f64 >= ARABIC_RATIO_THRESHOLD {
        Language::Ar
    } else {
        Language::En
    }
}

fn is_arabic_letter(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'   // Arabic
        | '\u{0750}'..='\u{077F}' // Arabic Supplement
        | '\u{08A0}'..='\u{08FF}' // Arabic Extended-A
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_text() {
        assert_eq!(
            detect_language("my neighbor's children have watery diarrhea"),
            Language::En
        );
    }

    #[test]
    fn arabic_text() {
        assert_eq!(detect_language("أطفال جاري مصابون بالإسهال"), Language::Ar);
    }

    #[test]
    fn mixed_text_with_enough_arabic_is_arabic() {
        // Arabic sentence with an English disease name.
        assert_eq!(detect_language("عندنا حالات cholera في الحي"), Language::Ar);
    }

    #[test]
    fn english_with_a_single_arabic_word_is_english() {
        assert_eq!(
            detect_language("There are many sick people in the village near خشم"),
            Language::En
        );
    }

    #[test]
    fn empty_and_letterless_text_is_unknown() {
        assert_eq!(detect_language(""), Language::Unknown);
        assert_eq!(detect_language("   "), Language::Unknown);
        assert_eq!(detect_language("123 !!! 456"), Language::Unknown);
        assert_eq!(detect_language("👍"), Language::Unknown);
    }

    #[test]
    fn digits_and_punctuation_are_ignored() {
        assert_eq!(detect_language("3 حالات!!! 2024"), Language::Ar);
    }
}
