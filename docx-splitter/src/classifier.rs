//! Content classifier: turns one non-heading block into its
//! emission-ready fragments. Heading blocks are section boundaries and
//! yield nothing here; the driver consumes them for numbering/titling.

use section_model::{Block, ContentFragment, Run};

/// Classify one block. Images surface as standalone fragments in
/// encounter order even though the source kept them inside a paragraph
/// run; list paragraphs always yield a `ListItem`; non-list paragraphs
/// with no text and no image yield nothing.
pub fn classify_block(block: Block) -> Vec<ContentFragment> {
    match block {
        Block::Heading { .. } => Vec::new(),
        Block::Paragraph { runs, .. } => classify_runs(runs, false),
        Block::ListParagraph { runs } => classify_runs(runs, true),
        Block::Table { rows } => vec![ContentFragment::Table(rows)],
    }
}

fn classify_runs(runs: Vec<Run>, list: bool) -> Vec<ContentFragment> {
    let mut out = Vec::new();
    let mut text = String::new();
    for run in runs {
        if let Some(image) = run.image {
            out.push(ContentFragment::Image(image));
        } else {
            let t = run.text.trim();
            if !t.is_empty() {
                text.push_str(t);
            }
        }
    }
    if list {
        out.push(ContentFragment::ListItem(text));
    } else if !text.is_empty() {
        out.push(ContentFragment::Text(text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use section_model::ImageRef;

    fn img(name: &str) -> ImageRef {
        ImageRef { bytes: vec![1, 2, 3], name: name.into(), width_cm: None, height_cm: None }
    }

    #[test]
    fn heading_yields_no_fragment() {
        let block = Block::Heading { level: 1, text: "概述".into() };
        assert!(classify_block(block).is_empty());
    }

    #[test]
    fn images_surface_before_the_accumulated_text() {
        let block = Block::Paragraph {
            style: String::new(),
            runs: vec![Run::text("before "), Run::image(img("a.png")), Run::text(" after")],
        };
        let frags = classify_block(block);
        assert_eq!(frags.len(), 2);
        assert!(matches!(frags[0], ContentFragment::Image(ref i) if i.name == "a.png"));
        assert_eq!(frags[1], ContentFragment::Text("beforeafter".into()));
    }

    #[test]
    fn whitespace_only_paragraph_is_dropped() {
        let block = Block::Paragraph { style: String::new(), runs: vec![Run::text("   \t")] };
        assert!(classify_block(block).is_empty());
    }

    #[test]
    fn list_paragraph_yields_list_item_even_when_empty() {
        let block = Block::ListParagraph { runs: Vec::new() };
        assert_eq!(classify_block(block), vec![ContentFragment::ListItem(String::new())]);
    }

    #[test]
    fn table_passes_through_as_one_fragment() {
        let rows = vec![vec!["a".to_string(), "b".to_string()]];
        let block = Block::Table { rows: rows.clone() };
        assert_eq!(classify_block(block), vec![ContentFragment::Table(rows)]);
    }
}
