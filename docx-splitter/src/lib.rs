pub mod reader_docx;
pub mod classifier;
pub mod image_norm;
pub mod numbering;
pub mod writer_docx;
pub mod emitter;
pub mod driver;

pub use driver::{merge_blocks_into, merge_docx_into, split_docx_file, SplitOptions, SplitOutcome};
pub use emitter::EmitOptions;

use section_model::NumberingError;

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    /// The source container could not be opened or parsed. Fatal for the run.
    #[error("failed to read source document: {0}")]
    SourceRead(String),
    /// The destination container could not be assembled or written.
    #[error("failed to write document: {0}")]
    Write(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Heading level outside 1..=3. Fatal for the current document;
    /// silent continuation would produce an ambiguous section number.
    #[error(transparent)]
    Numbering(#[from] NumberingError),
}
