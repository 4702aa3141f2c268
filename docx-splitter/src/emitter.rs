//! Fragment emission and section file naming.

use section_model::{ContentFragment, SectionCounter};

use crate::image_norm::DEFAULT_MAX_WIDTH_CM;
use crate::writer_docx::DocxWriter;

/// Emission settings shared by split and merge.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Font applied to every emitted body run.
    pub font: String,
    /// Maximum image width in centimeters.
    pub max_width_cm: f64,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions { font: "宋体".to_string(), max_width_cm: DEFAULT_MAX_WIDTH_CM }
    }
}

/// Write classified fragments to a document in order.
pub fn emit_fragments(writer: &mut DocxWriter, fragments: &[ContentFragment], opts: &EmitOptions) {
    for fragment in fragments {
        match fragment {
            ContentFragment::Text(text) => writer.add_paragraph(text, &opts.font),
            ContentFragment::ListItem(text) => writer.add_list_paragraph(text, &opts.font),
            ContentFragment::Image(image) => writer.add_image(image, opts.max_width_cm),
            ContentFragment::Table(rows) => writer.add_table(rows, &opts.font),
        }
    }
}

/// Output file name for one section: trimmed section number, "- ", then
/// the heading text with filesystem-hostile characters removed.
pub fn section_file_name(counter: &SectionCounter, heading: &str) -> String {
    format!("{}- {}.docx", counter.trimmed_label(), sanitize_heading(heading))
}

fn sanitize_heading(heading: &str) -> String {
    heading
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_hostile_characters() {
        let counter = SectionCounter::from_levels(1, 1, 0);
        assert_eq!(section_file_name(&counter, "测试*标题#"), "1.1- 测试标题.docx");
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let once = sanitize_heading("a/b\\c: d?");
        assert_eq!(sanitize_heading(&once), once);
        assert_eq!(once, "abc d");
    }

    #[test]
    fn deep_counter_keeps_full_trimmed_label() {
        let counter = SectionCounter::from_levels(2, 3, 4);
        assert_eq!(section_file_name(&counter, "部署"), "2.3.4- 部署.docx");
    }

    #[test]
    fn fragments_emit_in_order() {
        let mut writer = DocxWriter::new();
        let frags = vec![
            ContentFragment::Text("正文".into()),
            ContentFragment::ListItem("条目".into()),
            ContentFragment::Table(vec![vec!["x".into()]]),
        ];
        emit_fragments(&mut writer, &frags, &EmitOptions::default());
        let body = writer.body_xml();
        let text_at = body.find("正文").unwrap();
        let list_at = body.find("条目").unwrap();
        let cell_at = body.find(">x<").unwrap();
        assert!(text_at < list_at && list_at < cell_at);
        assert!(body.contains(r#"<w:pStyle w:val="ListParagraph"/>"#));
    }
}
