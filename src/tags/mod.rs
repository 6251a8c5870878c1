pub mod color;
pub mod registry;
pub mod snapshot;

pub use color::TagColor;
pub use registry::{TagBatch, TagRegistry, TagsChanged};
pub use snapshot::{StoredTags, TagSnapshot};
