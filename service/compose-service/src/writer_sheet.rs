//! Requirement sheet writer. Calamine only reads, so the updated sheet
//! is written back as a minimal single-worksheet XLSX package using
//! inline strings.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::FileOptions;

use crate::reader_sheet::RequirementRow;
use crate::ComposeError;

/// Header row, columns A..G.
pub const SHEET_HEADER: [&str; 7] =
    ["编号", "章节标题", "需求描述", "小节标题", "应答内容", "章节号", "素材文档"];

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#,
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
);

const WORKBOOK_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
);

const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\r\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf/></cellStyleXfs><cellXfs count="1"><xf/></cellXfs></styleSheet>"#,
);

const COLUMNS: [char; 7] = ['A', 'B', 'C', 'D', 'E', 'F', 'G'];

/// Write the header plus every row back to `path`, overwriting it.
/// Empty cells are omitted from the part entirely.
pub fn write_requirement_sheet(path: &str, rows: &[RequirementRow]) -> Result<(), ComposeError> {
    let mut sheet = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\r\n",
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    ));

    sheet.push_str(r#"<row r="1">"#);
    for (col, title) in SHEET_HEADER.iter().enumerate() {
        push_cell(&mut sheet, col, 1, title);
    }
    sheet.push_str("</row>");

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 2;
        sheet.push_str(&format!(r#"<row r="{r}">"#));
        let cells = [
            &row.id,
            &row.chapter,
            &row.requirement,
            &row.title,
            &row.answer,
            &row.section,
            &row.source_key,
        ];
        for (col, value) in cells.iter().enumerate() {
            if !value.is_empty() {
                push_cell(&mut sheet, col, r, value);
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    let pack = |e: zip::result::ZipError| ComposeError::Sheet(format!("zip error: {e}"));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK_XML),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES_XML),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ] {
        zip.start_file(name, options).map_err(pack)?;
        zip.write_all(content.as_bytes())?;
    }
    let cursor = zip.finish().map_err(pack)?;
    std::fs::write(path, cursor.into_inner())?;
    Ok(())
}

fn push_cell(sheet: &mut String, col: usize, row: u32, value: &str) {
    sheet.push_str(&format!(
        r#"<c r="{}{row}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        COLUMNS[col],
        escape(value),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader_sheet::read_requirement_rows;

    #[test]
    fn sheet_round_trips_through_the_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("需求对应表.xlsx");

        let rows = vec![
            RequirementRow {
                row: 2,
                id: "1".into(),
                chapter: "数据接入".into(),
                requirement: "支持<多种>数据源 & 格式".into(),
                title: "数据源管理".into(),
                answer: "完全支持。".into(),
                section: "2.1.1".into(),
                source_key: "3".into(),
            },
            RequirementRow { row: 3, requirement: "支持调度".into(), ..Default::default() },
        ];
        write_requirement_sheet(&path.to_string_lossy(), &rows).unwrap();

        let back = read_requirement_rows(&path.to_string_lossy()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].chapter, "数据接入");
        assert_eq!(back[0].requirement, "支持<多种>数据源 & 格式");
        assert_eq!(back[0].section, "2.1.1");
        assert_eq!(back[1].requirement, "支持调度");
        assert_eq!(back[1].chapter, "");
    }
}
