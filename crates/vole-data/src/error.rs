use std::io;
use std::path::PathBuf;

/// All errors that can occur while loading or querying a dataset.
///
/// Construction-time failures are fatal: a dataset that fails to load its
/// annotations is never partially usable.  [`DataError::IndexOutOfRange`] is
/// the only query-time error; it leaves the dataset untouched and the caller
/// may retry with a valid index.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Phase string other than `train` or `val`.
    #[error("invalid phase {0:?}: expected \"train\" or \"val\"")]
    InvalidPhase(String),

    /// Folder name without a numeric suffix after its leading character.
    #[error("malformed folder name {name:?}: expected a letter followed by digits")]
    MalformedFolderName { name: String },

    /// Annotation line that does not split into `<folder> <class-id> <label>`.
    #[error("malformed annotation line {line_no}: {line:?}")]
    MalformedAnnotationLine { line_no: usize, line: String },

    /// Image filename without a numeric token between its first two separators.
    #[error("malformed image name {name:?}: no numeric token")]
    MalformedImageName { name: String },

    /// A folder present on disk but absent from the annotation file, or the
    /// other way round.
    #[error("folder {folder:?} is missing from the annotation file or from disk")]
    MissingAnnotationForFolder { folder: String },

    /// A validation folder whose image count differs from the fixed
    /// per-class size.
    #[error("validation folder {folder:?} holds {len} images, expected {expected}")]
    ValFolderSize {
        folder: String,
        len: usize,
        expected: usize,
    },

    /// Global index outside `[0, len)`.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Image decoding failed.
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    /// I/O failure while listing directories or reading the annotation file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
