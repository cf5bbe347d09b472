use otsync_collab::Position;

/// Counts UTF-16 code units, the way every `positionAt`/`offsetAt` pair in
/// an editor host does — editor ranges are specified in code units, never
/// bytes or scalar values.
#[must_use]
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Translate a UTF-16 code-unit offset into `text` into a line/character
/// [`Position`], the analogue of `TextDocument.positionAt` (§4.3).
#[must_use]
pub fn position_at(text: &str, utf16_offset: usize) -> Position {
    let mut line = 0u32;
    let mut line_start_utf16 = 0usize;
    let mut consumed = 0usize;
    for ch in text.chars() {
        if consumed >= utf16_offset {
            break;
        }
        consumed += ch.len_utf16();
        if ch == '\n' {
            line += 1;
            line_start_utf16 = consumed;
        }
    }
    let character = utf16_offset.saturating_sub(line_start_utf16);
    Position::new(line, u32::try_from(character).unwrap_or(u32::MAX))
}

/// Translate a UTF-16 code-unit offset into `text` into a byte offset
/// suitable for `str` slicing/splicing. Offsets past the end of the text
/// clamp to `text.len()`.
#[must_use]
pub fn byte_offset_for_utf16(text: &str, utf16_offset: usize) -> usize {
    let mut consumed = 0usize;
    for (byte_idx, ch) in text.char_indices() {
        if consumed >= utf16_offset {
            return byte_idx;
        }
        consumed += ch.len_utf16();
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_at_start_of_second_line() {
        let text = "abc\ndef";
        assert_eq!(position_at(text, 4), Position::new(1, 0));
    }

    #[test]
    fn position_at_mid_line() {
        let text = "abc\ndef";
        assert_eq!(position_at(text, 6), Position::new(1, 2));
    }

    #[test]
    fn position_at_counts_astral_characters_as_two_units() {
        let text = "a\u{1F600}b"; // a, emoji (surrogate pair), b
        assert_eq!(utf16_len(text), 4);
        assert_eq!(position_at(text, 3), Position::new(0, 3));
        assert_eq!(byte_offset_for_utf16(text, 3), 1 + '\u{1F600}'.len_utf8());
    }
}
