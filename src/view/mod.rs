pub mod decoration;
pub mod tree;

pub use decoration::{DecorationProvider, FileDecoration};
pub use tree::{file_name, TagNode, TagTree};
