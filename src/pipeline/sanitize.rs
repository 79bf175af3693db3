//! Text sanitisation for synthesised pages.
//!
//! Extracted PDF text routinely carries NUL bytes, form feeds and the U+FFFD
//! replacement character left behind by broken font encodings. None of it
//! renders, and some of it confuses glyph layout, so it is stripped before
//! the text reaches the canvas.

/// Strip control characters except tab, newline and carriage return, and
/// remove the Unicode replacement character.
pub fn strip_unrenderable(input: &str) -> String {
    input
        .chars()
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .filter(|&c| c != '\u{FFFD}')
        .collect()
}

/// Escape `& < > " '` for embedding in HTML or XML.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keep at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &input[..byte_idx],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters() {
        let raw = "Dose: 500mg\x00\x01\x0c\nDate:\t2024";
        assert_eq!(strip_unrenderable(raw), "Dose: 500mg\nDate:\t2024");
    }

    #[test]
    fn keeps_carriage_return() {
        assert_eq!(strip_unrenderable("a\r\nb"), "a\r\nb");
    }

    #[test]
    fn removes_replacement_character() {
        assert_eq!(strip_unrenderable("R\u{FFFD}sultat"), "Rsultat");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_markup(r#"<b>Tom & "Jerry's"</b>"#),
            "&lt;b&gt;Tom &amp; &quot;Jerry&#39;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
