//! Split and merge drivers: walk the block stream, advance the section
//! counter on headings, and flush the buffered content of each section
//! when the next boundary arrives.
//!
//! Content is always flushed under the heading that preceded it, with
//! the counter value snapshotted when that heading was seen. In
//! segmentation mode, content before the first heading has no section
//! to live in and is discarded with a warning; merge mode keeps it,
//! since its inputs are usually headingless section files.

use std::path::PathBuf;

use log::{info, warn};
use section_model::{Block, ContentFragment, SectionCounter};

use crate::classifier::classify_block;
use crate::emitter::{emit_fragments, section_file_name, EmitOptions};
use crate::writer_docx::DocxWriter;
use crate::{reader_docx, SplitError};

#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    /// Directory the per-section files are written to.
    pub out_dir: PathBuf,
    pub emit: EmitOptions,
}

#[derive(Debug, Default)]
pub struct SplitOutcome {
    /// Section files written, in document order.
    pub files: Vec<PathBuf>,
}

/// Split a document into one file per numbered section.
pub fn split_docx_file(path: &str, opts: &SplitOptions) -> Result<SplitOutcome, SplitError> {
    let blocks = reader_docx::read_docx_to_blocks(path)?;
    split_blocks(blocks, opts)
}

/// Split an already-read block stream. Each heading advances the
/// counter at its level; the section's buffered fragments are written
/// out when the next heading (or the end of input) arrives.
pub fn split_blocks(blocks: Vec<Block>, opts: &SplitOptions) -> Result<SplitOutcome, SplitError> {
    std::fs::create_dir_all(&opts.out_dir)?;

    let mut counter = SectionCounter::new();
    let mut pending: Option<(String, SectionCounter)> = None;
    let mut buffer: Vec<ContentFragment> = Vec::new();
    let mut outcome = SplitOutcome::default();

    for block in blocks {
        if let Block::Heading { level, text } = block {
            flush_section(&mut pending, &mut buffer, opts, &mut outcome)?;
            counter.advance(level)?;
            pending = Some((text, counter));
        } else {
            buffer.extend(classify_block(block));
        }
    }
    flush_section(&mut pending, &mut buffer, opts, &mut outcome)?;

    info!("split wrote {} section file(s) to {}", outcome.files.len(), opts.out_dir.display());
    Ok(outcome)
}

fn flush_section(
    pending: &mut Option<(String, SectionCounter)>,
    buffer: &mut Vec<ContentFragment>,
    opts: &SplitOptions,
    outcome: &mut SplitOutcome,
) -> Result<(), SplitError> {
    let fragments = std::mem::take(buffer);
    match pending.take() {
        // a heading with no content produces no file
        Some((title, snapshot)) if !fragments.is_empty() => {
            let mut writer = DocxWriter::new();
            emit_fragments(&mut writer, &fragments, &opts.emit);
            let path = opts.out_dir.join(section_file_name(&snapshot, &title));
            writer.save(&path.to_string_lossy())?;
            outcome.files.push(path);
        }
        Some(_) => {}
        None if !fragments.is_empty() => {
            warn!("discarding {} fragment(s) found before the first heading", fragments.len());
        }
        None => {}
    }
    Ok(())
}

/// Append a source document's content to an open destination writer.
/// Unlike segmentation, nothing is discarded: every non-empty buffer is
/// flushed, including content that never saw a heading, so headingless
/// section files merge whole. Each flush is followed by two empty
/// separator paragraphs. Headings advance the shared counter at their
/// own level and are consumed, never emitted as body content. Returns
/// the number of flushed content groups.
pub fn merge_blocks_into(
    blocks: Vec<Block>,
    writer: &mut DocxWriter,
    counter: &mut SectionCounter,
    opts: &EmitOptions,
) -> Result<usize, SplitError> {
    let mut buffer: Vec<ContentFragment> = Vec::new();
    let mut sections = 0usize;

    let mut flush = |writer: &mut DocxWriter, buffer: &mut Vec<ContentFragment>, sections: &mut usize| {
        if buffer.is_empty() {
            return;
        }
        let fragments = std::mem::take(buffer);
        emit_fragments(writer, &fragments, opts);
        writer.add_empty_paragraph();
        writer.add_empty_paragraph();
        *sections += 1;
    };

    for block in blocks {
        if let Block::Heading { level, .. } = block {
            flush(writer, &mut buffer, &mut sections);
            counter.advance(level)?;
        } else {
            buffer.extend(classify_block(block));
        }
    }
    flush(writer, &mut buffer, &mut sections);

    Ok(sections)
}

/// Read `path` and append its sections to the destination writer.
pub fn merge_docx_into(
    path: &str,
    writer: &mut DocxWriter,
    counter: &mut SectionCounter,
    opts: &EmitOptions,
) -> Result<usize, SplitError> {
    let blocks = reader_docx::read_docx_to_blocks(path)?;
    let sections = merge_blocks_into(blocks, writer, counter, opts)?;
    info!("merged {sections} section(s) from {path}");
    Ok(sections)
}
