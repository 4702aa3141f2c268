//! Proposal composition service: reads a requirement sheet, generates
//! section titles and answers, numbers new sections into a destination
//! document and pulls in per-requirement source material documents.

pub mod generator;
pub mod reader_sheet;
pub mod workflow;
pub mod writer_sheet;

pub use workflow::{run_compose, ComposeConfig, ComposeReport};

use docx_splitter::SplitError;
use section_model::NumberingError;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The requirement sheet could not be opened or parsed.
    #[error("failed to read requirement sheet: {0}")]
    Sheet(String),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Generation(#[from] generator::GenerationError),
    #[error(transparent)]
    Numbering(#[from] NumberingError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
