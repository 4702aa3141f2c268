//! Requirement sheet reader. Columns A..G of the first worksheet:
//! id, chapter title, requirement text, section title, answer text,
//! section number, source material key. The first row is a header.

use calamine::Reader;

use crate::ComposeError;

/// One requirement row, 1-based `row` index as shown in a spreadsheet UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementRow {
    pub row: u32,
    pub id: String,
    pub chapter: String,
    pub requirement: String,
    pub title: String,
    pub answer: String,
    pub section: String,
    pub source_key: String,
}

/// Read all data rows from the first worksheet. Rows after the header
/// are returned as-is, including trailing empty ones; the workflow
/// decides where processing stops.
pub fn read_requirement_rows(path: &str) -> Result<Vec<RequirementRow>, ComposeError> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| ComposeError::Sheet(format!("cannot open {path}: {e}")))?;

    let names = workbook.sheet_names();
    let first = names
        .first()
        .cloned()
        .ok_or_else(|| ComposeError::Sheet(format!("{path} has no worksheets")))?;
    let range = match workbook.worksheet_range(&first) {
        Ok(r) => r,
        Err(e) => return Err(ComposeError::Sheet(format!("cannot read sheet {first}: {e}"))),
    };

    // The range is the used area only; a workbook whose column A is
    // entirely empty starts at B, so absolute column positions need the
    // start offset added back.
    let (first_row, first_col) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => (0, 0),
    };

    let mut rows = Vec::new();
    for (i, row) in range.rows().enumerate() {
        if i == 0 {
            continue; // header
        }
        let cell = |col: usize| {
            col.checked_sub(first_col)
                .and_then(|idx| row.get(idx))
                .map(cell_to_string)
                .unwrap_or_default()
        };
        rows.push(RequirementRow {
            row: (first_row + i) as u32 + 1,
            id: cell(0),
            chapter: cell(1),
            requirement: cell(2),
            title: cell(3),
            answer: cell(4),
            section: cell(5),
            source_key: cell(6),
        });
    }
    Ok(rows)
}

fn cell_to_string(c: &calamine::DataType) -> String {
    use calamine::DataType as D;
    match c {
        D::Empty => String::new(),
        D::String(s) => s.trim().to_string(),
        D::Float(f) => {
            if f.fract() == 0.0 { format!("{}", *f as i64) } else { f.to_string() }
        }
        D::Int(i) => i.to_string(),
        D::Bool(b) => if *b { "TRUE".into() } else { "FALSE".into() },
        other => format!("{other}"),
    }
}
