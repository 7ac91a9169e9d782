pub mod files;
pub mod merge;
pub mod types;

pub use files::resolve_files;
pub use merge::merge;
pub use types::Command;
