//! Capability adapters: thin wrappers that turn typed calls into tool
//! invocations on a session.

mod code;
mod command;
mod filesystem;
mod oss;

pub use code::{Code, CodeLanguage};
pub use command::Command;
pub use filesystem::{DirectoryEntry, FileInfo, FileSystem, WriteMode};
pub use oss::Oss;
