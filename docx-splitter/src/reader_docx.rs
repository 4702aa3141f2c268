//! DOCX block stream reader: opens the zip, parses `word/document.xml`
//! and yields the document's top-level content as ordered, typed blocks
//! (headings with level, paragraphs with styled runs, tables as
//! collapsed cell-text grids). Inline images are resolved through
//! `word/_rels/document.xml.rels` into owned payloads with their
//! declared physical size (EMU extents converted to centimeters).

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use section_model::{Block, ImageRef, Run};

use crate::image_norm::emu_to_cm;
use crate::SplitError;

fn local_name(q: &[u8]) -> &[u8] {
    match q.iter().position(|&b| b == b':') {
        Some(i) => &q[i + 1..],
        None => q,
    }
}

fn attr_val(e: &BytesStart<'_>, key_local: &[u8]) -> Option<String> {
    for a in e.attributes().with_checks(false) {
        if let Ok(attr) = a {
            if local_name(attr.key.as_ref()) == key_local {
                return Some(String::from_utf8_lossy(&attr.value).into_owned());
            }
        }
    }
    None
}

/// Relationship id -> target, parsed from a `.rels` part.
pub(crate) fn parse_relationships(xml: &str) -> HashMap<String, String> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == b"Relationship" {
                    if let (Some(id), Some(target)) = (attr_val(&e, b"Id"), attr_val(&e, b"Target")) {
                        rels.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    rels
}

/// Heading level from a paragraph style id, robust to variants like
/// "Heading1" / "Heading 1" / "heading2".
fn heading_level_from_style(val: &str) -> Option<u8> {
    let lower = val.to_ascii_lowercase();
    let rest = lower.strip_prefix("heading")?;
    let digits: String = rest.chars().filter(|ch| ch.is_ascii_digit()).collect();
    digits.parse::<u8>().ok().map(|n| n.max(1))
}

fn is_list_style(val: &str) -> bool {
    val == "ListParagraph" || val == "List Paragraph"
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Image parts preloaded from the archive, keyed by relationship id.
struct MediaPart {
    name: String,
    bytes: Vec<u8>,
}

/// Read a `.docx` file into its ordered top-level blocks. Read-only and
/// single-pass; paragraphs and tables stay interleaved exactly as they
/// appear in the source.
pub fn read_docx_to_blocks(path: &str) -> Result<Vec<Block>, SplitError> {
    let file = File::open(path)
        .map_err(|e| SplitError::SourceRead(format!("cannot open {path}: {e}")))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| SplitError::SourceRead(format!("{path} is not a valid .docx (zip): {e}")))?;

    let mut doc_xml = String::new();
    zip.by_name("word/document.xml")
        .map_err(|_| SplitError::SourceRead(format!("{path} is missing word/document.xml")))?
        .read_to_string(&mut doc_xml)
        .map_err(|e| SplitError::SourceRead(format!("cannot read word/document.xml: {e}")))?;

    // Relationships are optional; a document without images has none we need.
    let mut rels_xml = String::new();
    if let Ok(mut f) = zip.by_name("word/_rels/document.xml.rels") {
        let _ = f.read_to_string(&mut rels_xml);
    }
    let rels = parse_relationships(&rels_xml);

    // Preload media payloads referenced by the relationships.
    let mut media: HashMap<String, MediaPart> = HashMap::new();
    for (id, target) in &rels {
        if !target.contains("media/") {
            continue;
        }
        let entry = if let Some(stripped) = target.strip_prefix('/') {
            stripped.to_string()
        } else {
            format!("word/{target}")
        };
        match zip.by_name(&entry) {
            Ok(mut f) => {
                let mut bytes = Vec::new();
                if f.read_to_end(&mut bytes).is_ok() {
                    media.insert(id.clone(), MediaPart { name: base_name(target).to_string(), bytes });
                }
            }
            Err(_) => warn!("image part {entry} referenced by {id} is missing from {path}"),
        }
    }

    Ok(parse_document_xml(&doc_xml, &media, path))
}

fn parse_document_xml(doc_xml: &str, media: &HashMap<String, MediaPart>, path: &str) -> Vec<Block> {
    let mut reader = Reader::from_str(doc_xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    let mut blocks: Vec<Block> = Vec::new();

    // Paragraph state (top level only).
    let mut in_p = false;
    let mut style = String::new();
    let mut numbered = false;
    let mut heading_level: Option<u8> = None;
    let mut runs: Vec<Run> = Vec::new();

    // Run state.
    let mut in_run = false;
    let mut run_text = String::new();
    let mut run_image_rel: Option<String> = None;
    let mut run_extent: Option<(i64, i64)> = None;

    let mut in_text = false;

    // Table state. Only depth-1 tables become blocks; anything nested
    // collapses into the enclosing cell's text.
    let mut tbl_depth = 0usize;
    let mut table_rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_text = String::new();
    let mut in_cell = false;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"p" if tbl_depth == 0 => {
                    in_p = true;
                    style.clear();
                    numbered = false;
                    heading_level = None;
                    runs.clear();
                }
                b"r" if tbl_depth == 0 && in_p => {
                    in_run = true;
                    run_text.clear();
                    run_image_rel = None;
                    run_extent = None;
                }
                b"t" => in_text = true,
                b"tbl" => {
                    tbl_depth += 1;
                    if tbl_depth == 1 {
                        table_rows.clear();
                    }
                }
                b"tr" if tbl_depth == 1 => row.clear(),
                b"tc" if tbl_depth == 1 => {
                    in_cell = true;
                    cell_text.clear();
                }
                name => handle_property(name, &e, tbl_depth, in_p, in_run, &mut style, &mut numbered, &mut heading_level, &mut run_image_rel, &mut run_extent),
            },
            Ok(Event::Empty(e)) => {
                handle_property(local_name(e.name().as_ref()), &e, tbl_depth, in_p, in_run, &mut style, &mut numbered, &mut heading_level, &mut run_image_rel, &mut run_extent);
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"t" => in_text = false,
                b"r" if tbl_depth == 0 && in_p && in_run => {
                    if let Some(rel) = run_image_rel.take() {
                        match media.get(&rel) {
                            Some(part) => {
                                let (width_cm, height_cm) = match run_extent {
                                    Some((cx, cy)) => (Some(emu_to_cm(cx)), Some(emu_to_cm(cy))),
                                    None => (None, None),
                                };
                                runs.push(Run::image(ImageRef {
                                    bytes: part.bytes.clone(),
                                    name: part.name.clone(),
                                    width_cm,
                                    height_cm,
                                }));
                            }
                            None => {
                                // Malformed embedded image: keep the run as
                                // text-only and continue (block index logged
                                // for locating the content).
                                warn!(
                                    "cannot extract image {rel} in {path} (block {}); treating run as text",
                                    blocks.len()
                                );
                                if !run_text.is_empty() {
                                    runs.push(Run::text(run_text.clone()));
                                }
                            }
                        }
                    } else if !run_text.is_empty() {
                        runs.push(Run::text(run_text.clone()));
                    }
                    in_run = false;
                }
                b"p" if tbl_depth == 0 && in_p => {
                    if let Some(level) = heading_level {
                        let text: String = runs.iter().map(|r| r.text.as_str()).collect();
                        blocks.push(Block::Heading { level, text: text.trim().to_string() });
                    } else if is_list_style(&style) || numbered {
                        blocks.push(Block::ListParagraph { runs: std::mem::take(&mut runs) });
                    } else {
                        blocks.push(Block::Paragraph {
                            style: std::mem::take(&mut style),
                            runs: std::mem::take(&mut runs),
                        });
                    }
                    in_p = false;
                }
                b"tc" if tbl_depth == 1 && in_cell => {
                    row.push(std::mem::take(&mut cell_text));
                    in_cell = false;
                }
                b"tr" if tbl_depth == 1 => table_rows.push(std::mem::take(&mut row)),
                b"tbl" => {
                    if tbl_depth == 1 {
                        blocks.push(Block::Table { rows: std::mem::take(&mut table_rows) });
                    }
                    tbl_depth = tbl_depth.saturating_sub(1);
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if in_text {
                    if let Ok(cow) = t.unescape() {
                        if tbl_depth > 0 {
                            // Cells collapse to trimmed run text only;
                            // nested-table content is dropped.
                            if tbl_depth == 1 && in_cell {
                                cell_text.push_str(cow.trim());
                            }
                        } else if in_run {
                            run_text.push_str(&cow);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("stopping at malformed XML in {path}: {e}");
                break;
            }
            _ => {}
        }
    }

    blocks
}

/// Self-closing (or property) elements shared by the Start and Empty arms.
#[allow(clippy::too_many_arguments)]
fn handle_property(
    name: &[u8],
    e: &BytesStart<'_>,
    tbl_depth: usize,
    in_p: bool,
    in_run: bool,
    style: &mut String,
    numbered: &mut bool,
    heading_level: &mut Option<u8>,
    run_image_rel: &mut Option<String>,
    run_extent: &mut Option<(i64, i64)>,
) {
    match name {
        b"pStyle" if tbl_depth == 0 && in_p => {
            if let Some(val) = attr_val(e, b"val") {
                if let Some(level) = heading_level_from_style(&val) {
                    *heading_level = Some(level);
                }
                *style = val;
            }
        }
        // Paragraph outline level: 0 => Heading1, 1 => Heading2, ...
        b"outlineLvl" if tbl_depth == 0 && in_p => {
            if let Some(vs) = attr_val(e, b"val") {
                if let Ok(n) = vs.parse::<u8>() {
                    *heading_level = Some(n.saturating_add(1));
                }
            }
        }
        // Explicit list/numbering metadata on the paragraph.
        b"numPr" if tbl_depth == 0 && in_p => *numbered = true,
        b"blip" if tbl_depth == 0 && in_run => {
            if let Some(embed) = attr_val(e, b"embed") {
                *run_image_rel = Some(embed);
            }
        }
        b"extent" if tbl_depth == 0 && in_run => {
            if let (Some(cx), Some(cy)) = (attr_val(e, b"cx"), attr_val(e, b"cy")) {
                if let (Ok(cx), Ok(cy)) = (cx.parse::<i64>(), cy.parse::<i64>()) {
                    *run_extent = Some((cx, cy));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_levels_parse_from_style_variants() {
        assert_eq!(heading_level_from_style("Heading1"), Some(1));
        assert_eq!(heading_level_from_style("Heading 2"), Some(2));
        assert_eq!(heading_level_from_style("heading3"), Some(3));
        assert_eq!(heading_level_from_style("ListParagraph"), None);
        assert_eq!(heading_level_from_style("HeadingNote"), None);
    }

    #[test]
    fn relationships_parse_ids_and_targets() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="t" Target="styles.xml"/>
  <Relationship Id="rId4" Type="t" Target="media/image1.png"/>
</Relationships>"#;
        let rels = parse_relationships(xml);
        assert_eq!(rels.get("rId4").map(String::as_str), Some("media/image1.png"));
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn document_xml_parses_interleaved_blocks() {
        let xml = r#"<w:document xmlns:w="ns"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>第一章</w:t></w:r></w:p>
<w:p><w:r><w:t>正文内容</w:t></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="ListParagraph"/></w:pPr><w:r><w:t>条目一</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="2"/></w:numPr></w:pPr><w:r><w:t>条目二</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t> a </w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#;
        let blocks = parse_document_xml(xml, &HashMap::new(), "test.docx");
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0], Block::Heading { level: 1, text: "第一章".into() });
        assert!(matches!(&blocks[1], Block::Paragraph { runs, .. } if runs[0].text == "正文内容"));
        assert!(matches!(&blocks[2], Block::ListParagraph { runs } if runs[0].text == "条目一"));
        assert!(matches!(&blocks[3], Block::ListParagraph { runs } if runs[0].text == "条目二"));
        assert_eq!(blocks[4], Block::Table { rows: vec![vec!["a".into(), "b".into()]] });
    }

    #[test]
    fn nested_table_content_is_dropped_from_the_outer_cell() {
        let xml = r#"<w:document xmlns:w="ns"><w:body>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>外层</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>内层</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>尾部</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#;
        let blocks = parse_document_xml(xml, &HashMap::new(), "test.docx");
        assert_eq!(blocks, vec![Block::Table { rows: vec![vec!["外层尾部".into()]] }]);
    }

    #[test]
    fn image_run_resolves_payload_and_extent() {
        let xml = r#"<w:document xmlns:w="ns"><w:body>
<w:p><w:r><w:drawing><wp:inline><wp:extent cx="5040000" cy="2520000"/>
<a:graphic><a:graphicData><pic:pic><pic:blipFill><a:blip r:embed="rId9"/></pic:blipFill></pic:pic></a:graphicData></a:graphic>
</wp:inline></w:drawing></w:r></w:p>
</w:body></w:document>"#;
        let mut media = HashMap::new();
        media.insert("rId9".to_string(), MediaPart { name: "image1.png".into(), bytes: vec![9, 9] });
        let blocks = parse_document_xml(xml, &media, "test.docx");
        match &blocks[0] {
            Block::Paragraph { runs, .. } => {
                let image = runs[0].image.as_ref().unwrap();
                assert_eq!(image.name, "image1.png");
                assert_eq!(image.bytes, vec![9, 9]);
                assert!((image.width_cm.unwrap() - 14.0).abs() < 1e-9);
                assert!((image.height_cm.unwrap() - 7.0).abs() < 1e-9);
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn missing_media_falls_back_to_text_run() {
        let xml = r#"<w:document xmlns:w="ns"><w:body>
<w:p><w:r><w:t>图见下</w:t><w:drawing><a:blip r:embed="rIdMissing"/></w:drawing></w:r></w:p>
</w:body></w:document>"#;
        let blocks = parse_document_xml(xml, &HashMap::new(), "test.docx");
        match &blocks[0] {
            Block::Paragraph { runs, .. } => {
                assert_eq!(runs.len(), 1);
                assert!(runs[0].image.is_none());
                assert_eq!(runs[0].text, "图见下");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }
}
