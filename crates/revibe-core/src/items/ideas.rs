//! Text encoding for an item's idea list.
//!
//! Ideas are stored in a single text column as `" title: description"`
//! entries joined by `"; "`. Nothing is escaped: a title containing `:` or
//! any field containing `"; "` will not decode back to the same pairs.

use std::str::Split;

use super::model::Idea;

/// Separator between encoded ideas.
pub const IDEA_SEPARATOR: &str = "; ";

/// Encodes ideas into their stored text form.
///
/// An empty list encodes to an empty string.
#[must_use]
pub fn encode(ideas: &[Idea]) -> String {
    ideas
        .iter()
        .map(|idea| format!(" {}: {}", idea.title, idea.description))
        .collect::<Vec<_>>()
        .join(IDEA_SEPARATOR)
}

/// Decodes stored text into ideas.
///
/// The returned iterator is cheap to clone and can be restarted by
/// decoding again; blank input yields nothing.
#[must_use]
pub fn decode(encoded: &str) -> Ideas<'_> {
    let parts = if encoded.trim().is_empty() {
        None
    } else {
        Some(encoded.split(IDEA_SEPARATOR))
    };
    Ideas { parts }
}

/// Iterator over decoded ideas.
#[derive(Debug, Clone)]
pub struct Ideas<'a> {
    parts: Option<Split<'a, &'static str>>,
}

impl Iterator for Ideas<'_> {
    type Item = Idea;

    fn next(&mut self) -> Option<Self::Item> {
        let parts = self.parts.as_mut()?;
        parts.find(|part| !part.trim().is_empty()).map(parse_idea)
    }
}

/// Splits one entry on its first colon; later colons stay in the description.
fn parse_idea(part: &str) -> Idea {
    match part.split_once(':') {
        Some((title, description)) => Idea::new(title.trim(), description.trim()),
        None => Idea::new(part.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_format() {
        let ideas = vec![
            Idea::new("Planter", "Grow herbs in it"),
            Idea::new("Pencil holder", "Keep it on your desk"),
        ];
        assert_eq!(
            encode(&ideas),
            " Planter: Grow herbs in it;  Pencil holder: Keep it on your desk"
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode("").count(), 0);
        assert_eq!(decode("   ").count(), 0);
    }

    #[test]
    fn test_decode_keeps_extra_colons_in_description() {
        let ideas: Vec<_> = decode(" Timer: Set it for 10:30").collect();
        assert_eq!(ideas, vec![Idea::new("Timer", "Set it for 10:30")]);
    }

    #[test]
    fn test_decode_entry_without_colon() {
        let ideas: Vec<_> = decode("Compost it").collect();
        assert_eq!(ideas, vec![Idea::new("Compost it", "")]);
    }

    #[test]
    fn test_decode_skips_blank_entries() {
        let ideas: Vec<_> = decode(" A: one; ;  B: two; ").collect();
        assert_eq!(ideas, vec![Idea::new("A", "one"), Idea::new("B", "two")]);
    }

    #[test]
    fn test_decode_is_restartable() {
        let decoded = decode(" A: one;  B: two");
        let first: Vec<_> = decoded.clone().collect();
        let second: Vec<_> = decoded.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_delimiter_in_title_mis_splits() {
        let ideas = vec![Idea::new("Ratio 1:2", "Mix")];
        let decoded: Vec<_> = decode(&encode(&ideas)).collect();
        assert_ne!(decoded, ideas);
    }

    fn idea_strategy() -> impl Strategy<Value = Idea> {
        (
            "[A-Za-z0-9]([A-Za-z0-9 ]{0,16}[A-Za-z0-9])?",
            "[A-Za-z0-9]([A-Za-z0-9 :,.]{0,32}[A-Za-z0-9])?",
        )
            .prop_map(|(title, description)| Idea::new(title, description))
    }

    proptest! {
        #[test]
        fn prop_round_trip(ideas in proptest::collection::vec(idea_strategy(), 0..8)) {
            let decoded: Vec<_> = decode(&encode(&ideas)).collect();
            prop_assert_eq!(decoded, ideas);
        }
    }
}
