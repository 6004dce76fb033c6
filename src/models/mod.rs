pub mod file;
pub mod user;

pub use file::{FileDocument, FileList, FileRecord, FileType};
pub use user::{AccountRef, User};
