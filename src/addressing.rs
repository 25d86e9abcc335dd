use serde::{Deserialize, Serialize};

/// A user-mention span inside a status text, in character offsets.
///
/// Offsets count code points, not bytes, and `end` is exclusive: the text
/// `"@bot hello"` carries the span `(0, 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionSpan {
    pub start: usize,
    pub end: usize,
}

/// Returns the character offset marking the end of the leading contiguous
/// mention block.
///
/// The block only counts when it starts at offset 0. Each following mention
/// must begin exactly one character after the previous one ends (the single
/// separating space the platform inserts between stacked mentions); mentions
/// outside that run belong to the payload, not the addressing. An empty span
/// list yields 0.
pub fn leading_mention_boundary(spans: &[MentionSpan]) -> usize {
    let mut boundary = 0;
    for (i, span) in spans.iter().enumerate() {
        let chained = if i == 0 {
            span.start == 0
        } else {
            span.start == spans[i - 1].end + 1
        };
        if !chained {
            break;
        }
        boundary = span.end;
    }
    boundary
}

/// Slices the addressed payload out of `text`: everything after the leading
/// mention block, minus the separating whitespace. Text without a leading
/// block comes back unchanged.
pub fn addressed_text(text: &str, spans: &[MentionSpan]) -> String {
    let boundary = leading_mention_boundary(spans);
    if boundary == 0 {
        return text.to_string();
    }
    let byte_start = char_to_byte_offset(text, boundary);
    text[byte_start..].trim_start().to_string()
}

fn char_to_byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span(start: usize, end: usize) -> MentionSpan {
        MentionSpan { start, end }
    }

    #[test]
    fn test_no_mentions_returns_text_unchanged() {
        assert_eq!(addressed_text("hello world", &[]), "hello world");
        assert_eq!(addressed_text("  padded", &[]), "  padded");
        assert_eq!(leading_mention_boundary(&[]), 0);
    }

    #[test]
    fn test_single_leading_mention() {
        // "@bot hello"
        assert_eq!(addressed_text("@bot hello", &[span(0, 4)]), "hello");
    }

    #[test]
    fn test_stacked_leading_mentions() {
        // "@bot @helper please respond"
        let text = "@bot @helper please respond";
        let spans = [span(0, 4), span(5, 12)];
        assert_eq!(leading_mention_boundary(&spans), 12);
        assert_eq!(addressed_text(text, &spans), "please respond");
    }

    #[test]
    fn test_mention_not_at_offset_zero_is_payload() {
        // "hi @bot" addresses nobody; the whole text is the payload.
        assert_eq!(addressed_text("hi @bot", &[span(3, 7)]), "hi @bot");
    }

    #[test]
    fn test_chain_breaks_at_first_gap() {
        // "@bot x @helper y" — only "@bot" is in the leading run.
        let text = "@bot x @helper y";
        let spans = [span(0, 4), span(7, 14)];
        assert_eq!(leading_mention_boundary(&spans), 4);
        assert_eq!(addressed_text(text, &spans), "x @helper y");
    }

    #[test]
    fn test_mention_only_text_yields_empty_payload() {
        assert_eq!(addressed_text("@bot", &[span(0, 4)]), "");
    }

    #[test]
    fn test_offsets_are_character_based() {
        // Multi-byte characters before the payload must not shift the slice.
        let text = "@böt héllo";
        assert_eq!(addressed_text(text, &[span(0, 4)]), "héllo");
    }
}
