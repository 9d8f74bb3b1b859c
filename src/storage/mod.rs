pub mod archive;
pub mod datastore;
pub mod file_index;
pub mod table;

pub use archive::{ArchiveManager, EnsembleArchive};
pub use datastore::DataStore;
pub use file_index::{FileEntry, FileIndex, FileMetadata};
pub use table::Table;
