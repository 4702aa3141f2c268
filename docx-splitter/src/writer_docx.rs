//! DOCX writer: assembles a minimal OOXML package from scratch, or
//! appends content to an existing `.docx` while preserving every part
//! it does not touch byte for byte. Body XML is built as a string and
//! packaged with the zip writer; drawing elements self-declare their
//! namespaces so appended images stay valid regardless of what the
//! host document declared on its root.

use std::fs::File;
use std::io::{Cursor, Read, Write};

use log::warn;
use quick_xml::escape::escape;
use section_model::ImageRef;
use zip::write::FileOptions;

use crate::image_norm::{cm_to_emu, fit_to_width, natural_size_cm};
use crate::reader_docx::parse_relationships;
use crate::SplitError;

const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const DOCUMENT_HEAD: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>"#,
);
const DOCUMENT_TAIL: &str = "</w:body></w:document>";

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#,
);

const RELS_HEAD: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
);

const CONTENT_TYPES_HEAD: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
);

/// Minimal style sheet: Normal, three outline-numbered heading styles
/// and the list paragraph style the reader recognizes on the way back.
const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:sz w:val="24"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="720"/></w:pPr></w:style>"#,
    "</w:styles>",
);

fn media_content_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "application/octet-stream",
    }
}

fn file_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => "png",
    }
}

/// Parts of an opened package that are carried through unchanged, plus
/// the three rewritten parts pre-split at their insertion points.
struct ExistingPackage {
    /// part name -> raw bytes, everything except the rewritten parts
    parts: Vec<(String, Vec<u8>)>,
    document_head: String,
    document_tail: String,
    rels_head: String,
    content_types: String,
}

pub struct DocxWriter {
    body: String,
    media: Vec<(String, Vec<u8>)>,
    image_rels: Vec<(String, String)>,
    next_rel_id: u32,
    next_drawing_id: u32,
    next_media_seq: u32,
    existing: Option<ExistingPackage>,
}

impl Default for DocxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxWriter {
    /// A fresh, empty document.
    pub fn new() -> Self {
        DocxWriter {
            body: String::new(),
            media: Vec::new(),
            image_rels: Vec::new(),
            next_rel_id: 2,
            next_drawing_id: 1,
            next_media_seq: 1,
            existing: None,
        }
    }

    /// Open an existing `.docx` for appending. Every part other than
    /// the document body, its relationships and the content types is
    /// carried through to the saved output byte for byte.
    pub fn open(path: &str) -> Result<Self, SplitError> {
        let file = File::open(path)
            .map_err(|e| SplitError::SourceRead(format!("cannot open {path}: {e}")))?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| SplitError::SourceRead(format!("{path} is not a valid .docx (zip): {e}")))?;

        let mut parts = Vec::new();
        let mut document_xml = String::new();
        let mut rels_xml = String::new();
        let mut content_types = String::new();
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| SplitError::SourceRead(format!("cannot read {path}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            match name.as_str() {
                "word/document.xml" => {
                    entry
                        .read_to_string(&mut document_xml)
                        .map_err(|e| SplitError::SourceRead(format!("cannot read word/document.xml: {e}")))?;
                }
                "word/_rels/document.xml.rels" => {
                    entry
                        .read_to_string(&mut rels_xml)
                        .map_err(|e| SplitError::SourceRead(format!("cannot read document rels: {e}")))?;
                }
                "[Content_Types].xml" => {
                    entry
                        .read_to_string(&mut content_types)
                        .map_err(|e| SplitError::SourceRead(format!("cannot read content types: {e}")))?;
                }
                _ => {
                    let mut bytes = Vec::new();
                    entry
                        .read_to_end(&mut bytes)
                        .map_err(|e| SplitError::SourceRead(format!("cannot read {name}: {e}")))?;
                    parts.push((name, bytes));
                }
            }
        }
        if document_xml.is_empty() {
            return Err(SplitError::SourceRead(format!("{path} is missing word/document.xml")));
        }

        // New content goes before the trailing section properties so it
        // stays inside the last section's page setup.
        let split_at = document_xml
            .rfind("<w:sectPr")
            .or_else(|| document_xml.rfind("</w:body>"))
            .ok_or_else(|| SplitError::SourceRead(format!("{path} has no document body")))?;
        let (head, tail) = document_xml.split_at(split_at);

        let rels_head = match rels_xml.rfind("</Relationships>") {
            Some(pos) => rels_xml[..pos].to_string(),
            None => RELS_HEAD.to_string(),
        };
        let next_rel_id = parse_relationships(&rels_xml)
            .keys()
            .filter_map(|id| id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .unwrap_or(1)
            + 1;
        let next_media_seq = parts
            .iter()
            .filter(|(name, _)| name.starts_with("word/media/"))
            .count() as u32
            + 1;

        Ok(DocxWriter {
            body: String::new(),
            media: Vec::new(),
            image_rels: Vec::new(),
            next_rel_id,
            // docPr ids only have to be unique; starting past a generous
            // bound avoids scanning the whole host body for the maximum.
            next_drawing_id: 100_000,
            next_media_seq,
            existing: Some(ExistingPackage {
                parts,
                document_head: head.to_string(),
                document_tail: tail.to_string(),
                rels_head,
                content_types,
            }),
        })
    }

    pub fn add_paragraph(&mut self, text: &str, font: &str) {
        self.body.push_str(&paragraph_xml(None, text, Some(font)));
    }

    pub fn add_list_paragraph(&mut self, text: &str, font: &str) {
        self.body.push_str(&paragraph_xml(Some("ListParagraph"), text, Some(font)));
    }

    pub fn add_heading(&mut self, level: u8, text: &str) {
        let style = format!("Heading{level}");
        self.body.push_str(&paragraph_xml(Some(&style), text, None));
    }

    pub fn add_empty_paragraph(&mut self) {
        self.body.push_str("<w:p/>");
    }

    /// Append an inline image in its own paragraph. Size comes from the
    /// declared extent when present, otherwise from decoding the payload;
    /// width is clamped to `max_width_cm`. Unsized and undecodable
    /// payloads are skipped with a warning.
    pub fn add_image(&mut self, image: &ImageRef, max_width_cm: f64) {
        let size = match (image.width_cm, image.height_cm) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => natural_size_cm(&image.bytes),
        };
        let (width_cm, height_cm) = match size {
            Some(s) => s,
            None => {
                warn!("skipping image {}: no declared size and payload is undecodable", image.name);
                return;
            }
        };
        let (width_cm, height_cm) = fit_to_width(width_cm, height_cm, max_width_cm);
        let (cx, cy) = (cm_to_emu(width_cm), cm_to_emu(height_cm));

        let ext = file_extension(&image.name);
        let part = format!("word/media/aimage{}.{ext}", self.next_media_seq);
        self.next_media_seq += 1;
        let rid = format!("rId{}", self.next_rel_id);
        self.next_rel_id += 1;
        let target = part.trim_start_matches("word/").to_string();
        self.media.push((part, image.bytes.clone()));
        self.image_rels.push((rid.clone(), target));

        let id = self.next_drawing_id;
        self.next_drawing_id += 1;
        let name = escape(&image.name);
        self.body.push_str(&format!(
            concat!(
                r#"<w:p><w:r><w:drawing>"#,
                r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="{ns_wp}">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
                r#"<wp:docPr id="{id}" name="{name}"/>"#,
                r#"<a:graphic xmlns:a="{ns_a}"><a:graphicData uri="{ns_pic}">"#,
                r#"<pic:pic xmlns:pic="{ns_pic}">"#,
                r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rid}" xmlns:r="{ns_r}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
            ),
            ns_wp = NS_WP,
            ns_a = NS_A,
            ns_pic = NS_PIC,
            ns_r = NS_R,
            cx = cx,
            cy = cy,
            id = id,
            rid = rid,
            name = name,
        ));
    }

    /// Append a table with single hairline borders on all six edges.
    /// Rows shorter than the widest row are padded with empty cells.
    pub fn add_table(&mut self, rows: &[Vec<String>], font: &str) {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        if cols == 0 {
            return;
        }
        self.body.push_str(concat!(
            r#"<w:tbl><w:tblPr><w:tblBorders>"#,
            r#"<w:top w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#,
            r#"<w:left w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#,
            r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#,
            r#"<w:right w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#,
            r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#,
            r#"<w:insideV w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#,
            r#"</w:tblBorders></w:tblPr><w:tblGrid>"#,
        ));
        for _ in 0..cols {
            self.body.push_str("<w:gridCol/>");
        }
        self.body.push_str("</w:tblGrid>");
        for row in rows {
            self.body.push_str("<w:tr>");
            for col in 0..cols {
                let text = row.get(col).map(String::as_str).unwrap_or("");
                self.body.push_str("<w:tc><w:tcPr/>");
                self.body.push_str(&paragraph_xml(None, text, Some(font)));
                self.body.push_str("</w:tc>");
            }
            self.body.push_str("</w:tr>");
        }
        self.body.push_str("</w:tbl>");
    }

    /// The body XML accumulated so far. Appended-to documents only show
    /// the new content here, not the host body.
    pub fn body_xml(&self) -> &str {
        &self.body
    }

    pub fn save(self, path: &str) -> Result<(), SplitError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)
            .map_err(|e| SplitError::Write(format!("cannot write {path}: {e}")))?;
        Ok(())
    }

    pub fn to_bytes(self) -> Result<Vec<u8>, SplitError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        let pack = |e: zip::result::ZipError| SplitError::Write(format!("zip error: {e}"));

        match self.existing {
            Some(existing) => {
                for (name, bytes) in &existing.parts {
                    zip.start_file(name, options).map_err(pack)?;
                    zip.write_all(bytes)?;
                }
                zip.start_file("word/document.xml", options).map_err(pack)?;
                zip.write_all(existing.document_head.as_bytes())?;
                zip.write_all(self.body.as_bytes())?;
                zip.write_all(existing.document_tail.as_bytes())?;

                zip.start_file("word/_rels/document.xml.rels", options).map_err(pack)?;
                zip.write_all(existing.rels_head.as_bytes())?;
                zip.write_all(image_rel_xml(&self.image_rels).as_bytes())?;
                zip.write_all(b"</Relationships>")?;

                zip.start_file("[Content_Types].xml", options).map_err(pack)?;
                zip.write_all(ensure_image_defaults(&existing.content_types, &self.media).as_bytes())?;
            }
            None => {
                zip.start_file("[Content_Types].xml", options).map_err(pack)?;
                zip.write_all(new_content_types(&self.media).as_bytes())?;

                zip.start_file("_rels/.rels", options).map_err(pack)?;
                zip.write_all(ROOT_RELS.as_bytes())?;

                zip.start_file("word/document.xml", options).map_err(pack)?;
                zip.write_all(DOCUMENT_HEAD.as_bytes())?;
                zip.write_all(self.body.as_bytes())?;
                zip.write_all(DOCUMENT_TAIL.as_bytes())?;

                zip.start_file("word/styles.xml", options).map_err(pack)?;
                zip.write_all(STYLES_XML.as_bytes())?;

                zip.start_file("word/_rels/document.xml.rels", options).map_err(pack)?;
                zip.write_all(RELS_HEAD.as_bytes())?;
                zip.write_all(image_rel_xml(&self.image_rels).as_bytes())?;
                zip.write_all(b"</Relationships>")?;
            }
        }

        for (name, bytes) in &self.media {
            zip.start_file(name, options).map_err(pack)?;
            zip.write_all(bytes)?;
        }

        let cursor = zip.finish().map_err(pack)?;
        Ok(cursor.into_inner())
    }
}

fn paragraph_xml(style: Option<&str>, text: &str, font: Option<&str>) -> String {
    let mut out = String::from("<w:p>");
    if let Some(style) = style {
        out.push_str(&format!(r#"<w:pPr><w:pStyle w:val="{style}"/></w:pPr>"#));
    }
    out.push_str("<w:r>");
    if let Some(font) = font {
        let font = escape(font);
        out.push_str(&format!(
            r#"<w:rPr><w:rFonts w:ascii="{font}" w:eastAsia="{font}" w:hAnsi="{font}"/></w:rPr>"#
        ));
    }
    out.push_str(&format!(r#"<w:t xml:space="preserve">{}</w:t>"#, escape(text)));
    out.push_str("</w:r></w:p>");
    out
}

fn image_rel_xml(rels: &[(String, String)]) -> String {
    let mut out = String::new();
    for (rid, target) in rels {
        out.push_str(&format!(
            r#"<Relationship Id="{rid}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{target}"/>"#
        ));
    }
    out
}

fn media_extensions(media: &[(String, Vec<u8>)]) -> Vec<&str> {
    let mut exts: Vec<&str> = Vec::new();
    for (name, _) in media {
        let ext = file_extension(name);
        if !exts.contains(&ext) {
            exts.push(ext);
        }
    }
    exts
}

fn new_content_types(media: &[(String, Vec<u8>)]) -> String {
    let mut out = String::from(CONTENT_TYPES_HEAD);
    for ext in media_extensions(media) {
        out.push_str(&format!(
            r#"<Default Extension="{ext}" ContentType="{}"/>"#,
            media_content_type(ext)
        ));
    }
    out.push_str("</Types>");
    out
}

/// Insert `<Default>` entries for any appended image extension the host
/// content types do not already declare.
fn ensure_image_defaults(content_types: &str, media: &[(String, Vec<u8>)]) -> String {
    let mut inserts = String::new();
    for ext in media_extensions(media) {
        if !content_types.contains(&format!(r#"Extension="{ext}""#)) {
            inserts.push_str(&format!(
                r#"<Default Extension="{ext}" ContentType="{}"/>"#,
                media_content_type(ext)
            ));
        }
    }
    if inserts.is_empty() {
        return content_types.to_string();
    }
    match content_types.rfind("</Types>") {
        Some(pos) => {
            let mut out = String::with_capacity(content_types.len() + inserts.len());
            out.push_str(&content_types[..pos]);
            out.push_str(&inserts);
            out.push_str(&content_types[pos..]);
            out
        }
        None => content_types.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_xml_escapes_and_preserves_space() {
        let xml = paragraph_xml(None, "a < b & c", Some("宋体"));
        assert!(xml.contains(r#"<w:t xml:space="preserve">a &lt; b &amp; c</w:t>"#));
        assert!(xml.contains(r#"w:eastAsia="宋体""#));
    }

    #[test]
    fn heading_paragraph_carries_style_and_no_font() {
        let mut w = DocxWriter::new();
        w.add_heading(2, "1.1 概述");
        assert!(w.body_xml().contains(r#"<w:pStyle w:val="Heading2"/>"#));
        assert!(!w.body_xml().contains("rFonts"));
    }

    #[test]
    fn table_pads_ragged_rows_and_draws_all_borders() {
        let mut w = DocxWriter::new();
        w.add_table(&[vec!["a".into(), "b".into()], vec!["c".into()]], "宋体");
        let body = w.body_xml();
        assert_eq!(body.matches("<w:gridCol/>").count(), 2);
        assert_eq!(body.matches("<w:tc>").count(), 4);
        for edge in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
            assert!(body.contains(&format!(r#"<{edge} w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#)));
        }
    }

    #[test]
    fn declared_image_size_is_clamped_to_max_width() {
        let mut w = DocxWriter::new();
        let image = ImageRef {
            bytes: vec![0u8; 4],
            name: "wide.png".into(),
            width_cm: Some(28.0),
            height_cm: Some(14.0),
        };
        w.add_image(&image, 14.0);
        assert!(w.body_xml().contains(r#"<wp:extent cx="5040000" cy="2520000"/>"#));
        assert_eq!(w.media.len(), 1);
        assert_eq!(w.image_rels[0].1, "media/aimage1.png");
    }

    #[test]
    fn unsized_undecodable_image_is_skipped() {
        let mut w = DocxWriter::new();
        let image = ImageRef { bytes: vec![0u8; 4], name: "bad.png".into(), width_cm: None, height_cm: None };
        w.add_image(&image, 14.0);
        assert!(w.body_xml().is_empty());
        assert!(w.media.is_empty());
    }

    #[test]
    fn new_package_declares_image_defaults_once_per_extension() {
        let media = vec![
            ("word/media/aimage1.png".to_string(), vec![1]),
            ("word/media/aimage2.png".to_string(), vec![2]),
            ("word/media/aimage3.jpg".to_string(), vec![3]),
        ];
        let types = new_content_types(&media);
        assert_eq!(types.matches(r#"Extension="png""#).count(), 1);
        assert!(types.contains(r#"<Default Extension="jpg" ContentType="image/jpeg"/>"#));
    }

    #[test]
    fn existing_content_types_gain_only_missing_defaults() {
        let host = r#"<Types xmlns="x"><Default Extension="png" ContentType="image/png"/></Types>"#;
        let media = vec![
            ("word/media/aimage1.png".to_string(), vec![1]),
            ("word/media/aimage2.gif".to_string(), vec![2]),
        ];
        let out = ensure_image_defaults(host, &media);
        assert_eq!(out.matches(r#"Extension="png""#).count(), 1);
        assert!(out.ends_with(r#"<Default Extension="gif" ContentType="image/gif"/></Types>"#));
    }

    #[test]
    fn image_rel_ids_are_sequential_and_unique() {
        let mut w = DocxWriter::new();
        let image = ImageRef {
            bytes: vec![0u8; 4],
            name: "p.png".into(),
            width_cm: Some(4.0),
            height_cm: Some(4.0),
        };
        w.add_image(&image, 14.0);
        w.add_image(&image, 14.0);
        let rels = format!("{}{}</Relationships>", RELS_HEAD, image_rel_xml(&w.image_rels));
        let ids = parse_relationships(&rels);
        assert_eq!(ids.len(), 3);
        assert!(ids.contains_key("rId2") && ids.contains_key("rId3"));
    }
}
