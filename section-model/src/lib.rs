//! Shared models used across crates: document blocks, emission-ready
//! content fragments, and the hierarchical section counter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One top-level content unit of a document, in original document order.
/// Order in the stream is significant; blocks never move once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    /// Heading paragraph with its outline level (1-based) and plain text.
    Heading { level: u8, text: String },
    /// Body paragraph with its style id and ordered runs.
    Paragraph { style: String, runs: Vec<Run> },
    /// Paragraph carrying list styling or explicit numbering metadata.
    ListParagraph { runs: Vec<Run> },
    /// Table as a grid of collapsed cell text (images inside cells are dropped).
    Table { rows: Vec<Vec<String>> },
}

impl Block {
    /// Concatenated run text for paragraph-like blocks; empty for tables.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Heading { text, .. } => text.clone(),
            Block::Paragraph { runs, .. } | Block::ListParagraph { runs } => {
                runs.iter().map(|r| r.text.as_str()).collect()
            }
            Block::Table { .. } => String::new(),
        }
    }
}

/// A contiguous run of text or one embedded image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    pub image: Option<ImageRef>,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), image: None }
    }

    pub fn image(image: ImageRef) -> Self {
        Self { text: String::new(), image: Some(image) }
    }
}

/// An embedded image: raw payload plus declared physical size, when the
/// source carried one. Unset dimensions mean "use the natural size".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub bytes: Vec<u8>,
    pub name: String,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
}

/// A classified, emission-ready content unit derived from a `Block`.
/// Carries no back-reference to its originating block; raw bytes are owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentFragment {
    Text(String),
    ListItem(String),
    Image(ImageRef),
    Table(Vec<Vec<String>>),
}

/// Number of levels tracked by [`SectionCounter`].
pub const COUNTER_DEPTH: usize = 3;

/// Errors from the section numbering state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberingError {
    #[error("heading level {level} is outside the supported range 1..=3")]
    LevelOutOfRange { level: u8 },
}

/// Hierarchical section counter `[major, minor, patch]`.
///
/// Invariant: advancing level L zeroes every level deeper than L.
/// Trailing zero levels are trimmed only when formatting file names,
/// never in the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionCounter {
    levels: [u32; COUNTER_DEPTH],
}

impl SectionCounter {
    /// Counter at `[0, 0, 0]`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter at `[major, 0, 0]`.
    pub fn with_major(major: u32) -> Self {
        Self { levels: [major, 0, 0] }
    }

    pub fn from_levels(major: u32, minor: u32, patch: u32) -> Self {
        Self { levels: [major, minor, patch] }
    }

    pub fn major(&self) -> u32 {
        self.levels[0]
    }

    pub fn minor(&self) -> u32 {
        self.levels[1]
    }

    pub fn patch(&self) -> u32 {
        self.levels[2]
    }

    /// Advance the counter for a heading at `level` (1..=3).
    /// Increments that level and zeroes everything deeper.
    pub fn advance(&mut self, level: u8) -> Result<(), NumberingError> {
        let idx = match level {
            1..=3 => (level - 1) as usize,
            _ => return Err(NumberingError::LevelOutOfRange { level }),
        };
        self.levels[idx] += 1;
        for deeper in self.levels[idx + 1..].iter_mut() {
            *deeper = 0;
        }
        Ok(())
    }

    /// Full dot-joined label, e.g. `"1.2.0"`.
    pub fn label(&self) -> String {
        self.levels.map(|v| v.to_string()).join(".")
    }

    /// Dot-joined label with trailing zero levels removed; the major
    /// component is always kept. `[1,0,0]` -> `"1"`, `[1,2,0]` -> `"1.2"`.
    pub fn trimmed_label(&self) -> String {
        let mut end = COUNTER_DEPTH;
        while end > 1 && self.levels[end - 1] == 0 {
            end -= 1;
        }
        self.levels[..end]
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_level_one_resets_deeper_levels() {
        let mut c = SectionCounter::from_levels(3, 4, 5);
        c.advance(1).unwrap();
        assert_eq!(c, SectionCounter::from_levels(4, 0, 0));
    }

    #[test]
    fn advance_level_two_resets_patch_only() {
        let mut c = SectionCounter::from_levels(3, 4, 5);
        c.advance(2).unwrap();
        assert_eq!(c, SectionCounter::from_levels(3, 5, 0));
    }

    #[test]
    fn advance_level_three_touches_patch_only() {
        let mut c = SectionCounter::from_levels(3, 4, 5);
        c.advance(3).unwrap();
        assert_eq!(c, SectionCounter::from_levels(3, 4, 6));
    }

    #[test]
    fn advance_rejects_levels_outside_range() {
        let mut c = SectionCounter::new();
        assert_eq!(c.advance(0), Err(NumberingError::LevelOutOfRange { level: 0 }));
        assert_eq!(c.advance(4), Err(NumberingError::LevelOutOfRange { level: 4 }));
        // state untouched on error
        assert_eq!(c, SectionCounter::new());
    }

    #[test]
    fn trimmed_label_drops_trailing_zeros_but_keeps_major() {
        assert_eq!(SectionCounter::from_levels(1, 0, 0).trimmed_label(), "1");
        assert_eq!(SectionCounter::from_levels(1, 2, 0).trimmed_label(), "1.2");
        assert_eq!(SectionCounter::from_levels(1, 2, 3).trimmed_label(), "1.2.3");
        assert_eq!(SectionCounter::from_levels(1, 0, 3).trimmed_label(), "1.0.3");
        assert_eq!(SectionCounter::new().trimmed_label(), "0");
    }

    #[test]
    fn full_label_keeps_all_levels() {
        assert_eq!(SectionCounter::from_levels(2, 3, 1).label(), "2.3.1");
        assert_eq!(SectionCounter::from_levels(1, 0, 0).label(), "1.0.0");
    }
}
