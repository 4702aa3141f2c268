//! The compose run: walk the requirement sheet row by row, generate a
//! section title and answer per requirement, number a new section into
//! the destination document and fill it from the matching source
//! material document (or generated fallback content), then write the
//! derived columns back to the sheet.

use std::path::{Path, PathBuf};

use docx_splitter::driver::merge_docx_into;
use docx_splitter::numbering::reconstruct_counter;
use docx_splitter::reader_docx::read_docx_to_blocks;
use docx_splitter::writer_docx::DocxWriter;
use docx_splitter::EmitOptions;
use log::{info, warn};
use section_model::SectionCounter;
use serde::Serialize;

use crate::generator::{answer_requirement, generate_solution, shorten_title, TextGenerator};
use crate::reader_sheet::read_requirement_rows;
use crate::writer_sheet::write_requirement_sheet;
use crate::ComposeError;

#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Requirement sheet, updated in place.
    pub sheet_path: String,
    /// Destination document, updated in place.
    pub doc_path: String,
    /// Directory scanned for `{key}-*.docx` source material files.
    pub source_dir: PathBuf,
    /// Major level used when the destination has no numbered heading to
    /// continue from.
    pub start_major: u32,
    /// Emit the requirement and a point-to-point answer paragraph under
    /// each section heading.
    pub point_answer: bool,
    /// Carry a leading ★ or ▲ from the requirement onto the title.
    pub mark_keywords: bool,
    pub emit: EmitOptions,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        ComposeConfig {
            sheet_path: "需求对应表.xlsx".to_string(),
            doc_path: "标书内容.docx".to_string(),
            source_dir: PathBuf::from("."),
            start_major: 2,
            point_answer: true,
            mark_keywords: false,
            emit: EmitOptions::default(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ComposeReport {
    pub rows_processed: usize,
    pub sections_added: usize,
    pub documents_merged: usize,
    pub solutions_generated: usize,
}

/// Run one compose pass. Processing stops at the first row with an
/// empty requirement cell; rows after it are written back untouched.
pub fn run_compose(
    config: &ComposeConfig,
    generator: &dyn TextGenerator,
) -> Result<ComposeReport, ComposeError> {
    let mut rows = read_requirement_rows(&config.sheet_path)?;
    let blocks = read_docx_to_blocks(&config.doc_path)?;
    let mut counter = reconstruct_counter(&blocks)
        .unwrap_or_else(|| SectionCounter::with_major(config.start_major));
    info!("composing into {} from section {}", config.doc_path, counter.trimmed_label());

    let mut writer = DocxWriter::open(&config.doc_path)?;
    let mut report = ComposeReport::default();

    for row in rows.iter_mut() {
        if row.requirement.is_empty() {
            break;
        }
        report.rows_processed += 1;

        let title = shorten_title(generator, &row.requirement, config.mark_keywords)?;
        let answer = answer_requirement(generator, &row.requirement)?;

        // A chapter cell opens a new level-2 section holding this row's
        // level-3 section; otherwise the row continues the current one.
        if !row.chapter.is_empty() {
            counter.advance(2)?;
            writer.add_heading(2, &format!(" {}", row.chapter));
            counter.advance(3)?;
            writer.add_heading(3, &title);
        } else {
            counter.advance(3)?;
            writer.add_heading(3, &format!(" {title}"));
        }
        report.sections_added += 1;
        row.section = counter.label();
        row.title = title;
        row.answer = answer.clone();

        if config.point_answer {
            writer.add_paragraph(&row.requirement, &config.emit.font);
            writer.add_paragraph(&format!("答：{answer}"), &config.emit.font);
        }

        match find_source_doc(&config.source_dir, &row.source_key) {
            Some(path) => {
                merge_docx_into(&path.to_string_lossy(), &mut writer, &mut counter, &config.emit)?;
                report.documents_merged += 1;
            }
            None => {
                if !row.source_key.is_empty() {
                    warn!(
                        "row {}: no file matching {}-*.docx in {}, generating content instead",
                        row.row,
                        row.source_key,
                        config.source_dir.display()
                    );
                }
                let solution = generate_solution(generator, &row.requirement)?;
                writer.add_paragraph(&solution, &config.emit.font);
                report.solutions_generated += 1;
            }
        }
    }

    write_requirement_sheet(&config.sheet_path, &rows)?;
    writer.save(&config.doc_path)?;
    info!(
        "compose finished: {} row(s), {} section(s), {} merged, {} generated",
        report.rows_processed, report.sections_added, report.documents_merged, report.solutions_generated
    );
    Ok(report)
}

/// Find the source material document for a key: the first directory
/// entry named `{key}-*.docx`. An empty key never matches.
pub fn find_source_doc(dir: &Path, key: &str) -> Option<PathBuf> {
    if key.is_empty() {
        return None;
    }
    let prefix = format!("{key}-");
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".docx") {
            return Some(entry.path());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_lookup_matches_key_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("3- 数据接入.docx"), b"x").unwrap();
        std::fs::write(dir.path().join("13- 其他.docx"), b"x").unwrap();

        let found = find_source_doc(dir.path(), "3").unwrap();
        assert!(found.ends_with("3- 数据接入.docx"));
        assert!(find_source_doc(dir.path(), "4").is_none());
        assert!(find_source_doc(dir.path(), "").is_none());
    }
}
