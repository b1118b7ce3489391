//! Upload batches: validation, blob transfer ordering, downloads.

pub mod error;
pub mod service;
pub mod types;

pub use error::UploadError;
pub use service::{MAX_FILES_PER_BATCH, UploadRepository, UploadService};
pub use types::{
    BatchWithFiles, CreateBatchInput, CreateFileInput, Disposition, DownloadDescriptor,
    DownloadTarget, FileRecord, IncomingFile, SubmitUploadInput,
};
