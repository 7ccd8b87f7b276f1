//! Reference and scope document handling: text extraction and on-disk
//! upload storage.

pub mod extract;
pub mod uploads;

pub use extract::{load_document, load_scope_document, read_document, read_scope_document, DocumentError};
pub use uploads::{sanitize_file_name, sha256_hex, TempUpload, UploadStore};
