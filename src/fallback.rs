//! Static single-letter substitution tables used when no rule covers a letter.

use phf::phf_map;

static ARABIC_FALLBACK: phf::Map<char, &'static str> = phf_map! {
    'a' => "ا", 'b' => "ب", 'c' => "س", 'd' => "د", 'e' => "ي",
    'f' => "ف", 'g' => "ج", 'h' => "ه", 'i' => "ي", 'j' => "ج",
    'k' => "ك", 'l' => "ل", 'm' => "م", 'n' => "ن", 'o' => "و",
    'p' => "ب", 'q' => "ق", 'r' => "ر", 's' => "س", 't' => "ت",
    'u' => "و", 'v' => "ف", 'w' => "و", 'x' => "كس", 'y' => "ي",
    'z' => "ز",
};

// Swahili is written in Latin script; only letters outside its alphabet change.
static SWAHILI_FALLBACK: phf::Map<char, &'static str> = phf_map! {
    'a' => "a", 'b' => "b", 'c' => "ch", 'd' => "d", 'e' => "e",
    'f' => "f", 'g' => "g", 'h' => "h", 'i' => "i", 'j' => "j",
    'k' => "k", 'l' => "l", 'm' => "m", 'n' => "n", 'o' => "o",
    'p' => "p", 'q' => "k", 'r' => "r", 's' => "s", 't' => "t",
    'u' => "u", 'v' => "v", 'w' => "w", 'x' => "ks", 'y' => "y",
    'z' => "z",
};

fn table_for(script: &str) -> Option<&'static phf::Map<char, &'static str>> {
    match script {
        "Arabic" => Some(&ARABIC_FALLBACK),
        "Swahili" => Some(&SWAHILI_FALLBACK),
        _ => None,
    }
}

/// Fallback text for a single letter in `script`.
///
/// Lookup is case-insensitive for ASCII letters. Letters without an entry, and
/// every letter of a script without a table, map to themselves.
pub(crate) fn fallback_target(script: &str, c: char) -> String {
    table_for(script)
        .and_then(|table| table.get(&c.to_ascii_lowercase()))
        .map(|t| t.to_string())
        .unwrap_or_else(|| c.to_string())
}

/// Whether `script` has a static fallback table.
pub fn has_fallback_table(script: &str) -> bool {
    table_for(script).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arabic_letters_map() {
        assert_eq!(fallback_target("Arabic", 's'), "س");
        assert_eq!(fallback_target("Arabic", 'x'), "كس");
    }

    #[test]
    fn lookup_ignores_ascii_case() {
        assert_eq!(fallback_target("Arabic", 'H'), "ه");
        assert_eq!(fallback_target("Swahili", 'Q'), "k");
    }

    #[test]
    fn unmapped_letters_pass_through() {
        assert_eq!(fallback_target("Arabic", 'ş'), "ş");
        assert_eq!(fallback_target("Devanagari", 'k'), "k");
        assert_eq!(fallback_target("NoSuchScript", 'K'), "K");
    }

    #[test]
    fn every_ascii_letter_is_covered() {
        for c in 'a'..='z' {
            assert!(ARABIC_FALLBACK.contains_key(&c), "Arabic table lacks {c}");
            assert!(SWAHILI_FALLBACK.contains_key(&c), "Swahili table lacks {c}");
        }
    }

    #[test]
    fn script_names_are_case_sensitive() {
        assert!(has_fallback_table("Arabic"));
        assert!(!has_fallback_table("arabic"));
    }
}
