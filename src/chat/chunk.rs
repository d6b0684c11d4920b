//! Splitting of long answers into platform-sized messages
//!
//! Lengths are counted in UTF-16 code units, which is how Telegram measures
//! message text (an emoji outside the BMP counts twice).

/// Byte index of the first character that would push `text` past `max_units`
/// UTF-16 code units, or `None` when the whole text fits.
fn cut_index(text: &str, max_units: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            // Always make progress, even when a single character exceeds the limit
            return Some(if idx == 0 { ch.len_utf8() } else { idx });
        }
    }
    None
}

/// Longest prefix of `text` within `max_units` UTF-16 code units
pub fn truncate_units(text: &str, max_units: usize) -> &str {
    match cut_index(text, max_units) {
        Some(cut) => &text[..cut],
        None => text,
    }
}

/// Split `text` into pieces of at most `max_units` UTF-16 code units.
///
/// Prefers paragraph breaks, then line breaks, then spaces; falls back to a hard
/// cut on a character boundary. The separator at a split point is dropped, and
/// pieces with nothing but whitespace are skipped.
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let limit = max_units.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let Some(cut) = cut_index(remaining, limit) else {
            push_visible(&mut chunks, remaining);
            break;
        };

        let window = &remaining[..cut];
        let (split_at, skip) = [("\n\n", 2), ("\n", 1), (" ", 1)]
            .iter()
            .find_map(|(sep, len)| {
                window
                    .rfind(*sep)
                    .filter(|&pos| pos > 0)
                    .map(|pos| (pos, *len))
            })
            .unwrap_or((cut, 0));

        push_visible(&mut chunks, &remaining[..split_at]);
        remaining = &remaining[split_at + skip..];
    }

    chunks
}

fn push_visible(chunks: &mut Vec<String>, piece: &str) {
    if !piece.trim().is_empty() {
        chunks.push(piece.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = "first para\n\nsecond para";
        assert_eq!(split_message(text, 15), vec!["first para", "second para"]);
    }

    #[test]
    fn test_falls_back_to_space() {
        let text = "alpha beta gamma";
        assert_eq!(split_message(text, 11), vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn test_hard_cut_respects_char_boundaries() {
        let text = "ééééé";
        let chunks = split_message(text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn test_every_chunk_within_limit() {
        let text = "word ".repeat(2000);
        for chunk in split_message(&text, 4096) {
            assert!(chunk.encode_utf16().count() <= 4096);
        }
    }

    #[test]
    fn test_limit_counts_utf16_units() {
        // Each of these emoji is two UTF-16 units
        let text = "😀".repeat(5);
        let chunks = split_message(&text, 4);
        assert_eq!(chunks, vec!["😀😀", "😀😀", "😀"]);
    }

    #[test]
    fn test_whitespace_runs_produce_no_blank_chunks() {
        let text = format!("start{}end", " ".repeat(50));
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].trim(), "start");
        assert_eq!(chunks[1].trim(), "end");
    }

    #[test]
    fn test_whitespace_only_text_has_no_chunks() {
        assert!(split_message(&"\n".repeat(30), 8).is_empty());
    }

    #[test]
    fn test_truncate_units() {
        assert_eq!(truncate_units("hello", 10), "hello");
        assert_eq!(truncate_units("hello", 3), "hel");
        assert_eq!(truncate_units("a😀b", 2), "a");
    }
}
