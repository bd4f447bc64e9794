//! Percent-encoding for values embedded in request targets.

use std::fmt::Write;

/// Characters that are replaced by their `%XX` escape.
pub const RESERVED: &str = " %!\"#$&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Whether `ch` belongs to the reserved set.
pub fn is_reserved(ch: char) -> bool {
    RESERVED.contains(ch)
}

/// Replace every reserved character with its uppercase percent escape.
///
/// The input is scanned once, so each character is escaped exactly once and
/// a `%` produced by an escape is never escaped again. Characters outside the
/// reserved set, including non-ASCII ones, pass through unchanged.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_reserved(ch) {
            // Reserved characters are all ASCII, so one byte covers them.
            let _ = write!(out, "%{:02X}", ch as u32);
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(encode("Hello123"), "Hello123");
        assert_eq!(encode(""), "");
    }

    #[test]
    fn test_space_and_punctuation() {
        assert_eq!(encode("Hello World!"), "Hello%20World%21");
        assert_eq!(encode("a-b_c.d~e"), "a%2Db%5Fc%2Ed%7Ee");
    }

    #[test]
    fn test_percent_escaped_once() {
        assert_eq!(encode("100%"), "100%25");
        assert_eq!(encode("%20"), "%2520");
    }

    #[test]
    fn test_every_reserved_character() {
        for ch in RESERVED.chars() {
            let encoded = encode(&ch.to_string());
            assert_eq!(encoded, format!("%{:02X}", ch as u32), "char {:?}", ch);
            assert_eq!(encoded.matches('%').count(), 1);
        }
    }

    #[test]
    fn test_known_escapes() {
        assert_eq!(encode("\"{}\""), "%22%7B%7D%22");
        assert_eq!(encode("a\\b"), "a%5Cb");
        assert_eq!(encode("12345:ABC"), "12345%3AABC");
    }

    #[test]
    fn test_non_ascii_passes_through() {
        assert_eq!(encode("héllo"), "héllo");
    }

    #[test]
    fn test_output_has_no_reserved_except_escapes() {
        let encoded = encode("k=v&x=1 + 2 @ [home]");
        assert!(encoded
            .chars()
            .all(|c| c == '%' || !is_reserved(c)));
    }
}
