//! Counter reconstruction from a document that already carries numbered
//! headings, so a merge can continue the sequence instead of restarting
//! at zero.

use section_model::{Block, SectionCounter};

/// Recover the section counter from existing headings. A heading at
/// level L whose text starts with L-1 dot-joined numerals names its
/// parent chain and fills counter levels 1..L-1 (deeper levels zeroed);
/// the last matching heading in document order wins. Returns `None`
/// when no heading carries a usable prefix.
pub fn reconstruct_counter(blocks: &[Block]) -> Option<SectionCounter> {
    let mut found = None;
    for block in blocks {
        if let Block::Heading { level, text } = block {
            if let Some(counter) = counter_from_heading(*level, text) {
                found = Some(counter);
            }
        }
    }
    found
}

fn counter_from_heading(level: u8, text: &str) -> Option<SectionCounter> {
    match level {
        2 => {
            let nums = leading_numerals(text, 1)?;
            Some(SectionCounter::from_levels(nums[0], 0, 0))
        }
        3 => {
            let nums = leading_numerals(text, 2)?;
            Some(SectionCounter::from_levels(nums[0], nums[1], 0))
        }
        // Level-1 headings carry no parent prefix to read.
        _ => None,
    }
}

/// Parse exactly `count` dot-separated numerals from the start of `text`.
fn leading_numerals(text: &str, count: usize) -> Option<Vec<u32>> {
    let mut rest = text.trim_start();
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        out.push(digits.parse().ok()?);
        rest = &rest[digits.len()..];
        if i + 1 < count {
            rest = rest.strip_prefix('.')?;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u8, text: &str) -> Block {
        Block::Heading { level, text: text.into() }
    }

    #[test]
    fn level_three_prefix_continues_inside_its_parent() {
        let blocks = vec![heading(3, "2.3 Foo")];
        let mut counter = reconstruct_counter(&blocks).unwrap();
        assert_eq!(counter, SectionCounter::from_levels(2, 3, 0));
        counter.advance(3).unwrap();
        assert_eq!(counter.label(), "2.3.1");
    }

    #[test]
    fn level_two_prefix_recovers_the_major() {
        let blocks = vec![heading(2, "5 数据接入")];
        let mut counter = reconstruct_counter(&blocks).unwrap();
        assert_eq!(counter, SectionCounter::from_levels(5, 0, 0));
        counter.advance(2).unwrap();
        assert_eq!(counter.trimmed_label(), "5.1");
    }

    #[test]
    fn last_matching_heading_wins() {
        let blocks = vec![
            heading(2, "1 概述"),
            heading(3, "1.1 范围"),
            heading(3, "1.4 术语"),
        ];
        assert_eq!(
            reconstruct_counter(&blocks),
            Some(SectionCounter::from_levels(1, 4, 0))
        );
    }

    #[test]
    fn unnumbered_headings_yield_nothing() {
        let blocks = vec![heading(1, "概述"), heading(2, "背景"), heading(3, "目标 2.3")];
        assert_eq!(reconstruct_counter(&blocks), None);
    }

    #[test]
    fn level_three_needs_two_numerals() {
        assert_eq!(reconstruct_counter(&[heading(3, "7 标题")]), None);
    }
}
