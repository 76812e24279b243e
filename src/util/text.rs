use std::borrow::Cow;

/// SEC-001: Strip control characters and ANSI escape sequences from text.
///
/// Feed titles and review bodies are user-controlled. They end up inside a
/// note file and are echoed on the terminal by `--dry-run`, so escape
/// sequences must not survive.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - ANSI CSI sequences: `\x1b[` ... (terminal byte 0x40-0x7E)
/// - ANSI OSC sequences: `\x1b]` ... (until BEL 0x07 or ST `\x1b\\`)
/// - Bare ESC (0x1b) not followed by `[` or `]`
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains no control characters (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    let needs_strip = bytes.iter().any(|&b| is_stripped(b));
    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b == 0x1b {
            if i + 1 < len && bytes[i + 1] == b'[' {
                // CSI: parameter/intermediate bytes until the final byte
                i += 2;
                while i < len {
                    let c = bytes[i];
                    i += 1;
                    if (0x40..=0x7e).contains(&c) {
                        break;
                    }
                }
            } else if i + 1 < len && bytes[i + 1] == b']' {
                // OSC: everything until BEL or ST
                i += 2;
                while i < len {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && i + 1 < len && bytes[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            } else {
                i += 1;
            }
        } else if is_stripped(b) {
            i += 1;
        } else {
            let start = i;
            i += 1;
            while i < len && !is_stripped(bytes[i]) {
                i += 1;
            }
            // SAFETY: we only break on ASCII control bytes, which cannot appear
            // mid-codepoint in valid UTF-8, so s[start..i] is valid UTF-8.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}

#[inline]
fn is_stripped(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d)
}

/// Collapse every run of whitespace (including newlines) into a single space
/// and trim both ends.
///
/// Used for anything that must fit on one markdown line: film titles,
/// review paragraphs in list style.
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Escape characters that would terminate or nest a markdown link label.
///
/// Returns `Cow::Borrowed` when there is nothing to escape.
pub fn escape_link_text(s: &str) -> Cow<'_, str> {
    if !s.contains(['[', ']', '\\']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // strip_control_chars tests
    // ========================================================================

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "Hello, world! This is clean text.";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_preserves_tabs_newlines_cr() {
        let input = "line1\nline2\ttabbed\r\nwindows";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_control_chars_removes_controls() {
        let input = "he\x00ll\x07o\x08 w\x0bor\x0cld\x01!";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result, "hello world!");
    }

    #[test]
    fn test_strip_ansi_color_codes() {
        let input = "\x1b[31mRed text\x1b[0m";
        assert_eq!(strip_control_chars(input), "Red text");
    }

    #[test]
    fn test_strip_osc_with_bel() {
        let input = "\x1b]0;malicious title\x07safe text";
        assert_eq!(strip_control_chars(input), "safe text");
    }

    #[test]
    fn test_strip_osc_with_st() {
        let input = "\x1b]0;malicious title\x1b\\safe text";
        assert_eq!(strip_control_chars(input), "safe text");
    }

    #[test]
    fn test_strip_bare_esc() {
        assert_eq!(strip_control_chars("before\x1bafter"), "beforeafter");
    }

    #[test]
    fn test_strip_unicode_preserved() {
        let input = "Amélie \x1b[31m★\x1b[0m ½";
        assert_eq!(strip_control_chars(input), "Amélie ★ ½");
    }

    // ========================================================================
    // collapse_whitespace tests
    // ========================================================================

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a  b\n\nc\t d"), "a b c d");
        assert_eq!(collapse_whitespace("   "), "");
        assert_eq!(collapse_whitespace("single"), "single");
    }

    // ========================================================================
    // escape_link_text tests
    // ========================================================================

    #[test]
    fn test_escape_plain_title_borrowed() {
        let result = escape_link_text("Past Lives");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_brackets_and_backslash() {
        assert_eq!(escape_link_text("[REC]"), "\\[REC\\]");
        assert_eq!(escape_link_text("a\\b"), "a\\\\b");
    }
}
