mod json_rows;
mod memory;
mod server_interface;
mod sqlite_rows;
mod zip_archive;

pub use json_rows::JsonRowSource;
pub use memory::{MemoryArchiveStore, MemoryRowSource};
pub use server_interface::{
    checked_archive_path, ArchiveStore, ErrorDetails, ErrorLayer, Result, RowSource, ServerError,
};
pub use sqlite_rows::{SqliteRowSource, FILE_TREE_QUERY};
pub use zip_archive::{ZipArchiveStore, DEFAULT_ENTRY_PREFIX};
