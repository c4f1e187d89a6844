//! Query parameter decoding.

pub mod decode;
pub mod list;
pub mod registry;

pub use decode::{ItemSpec, Limits, RawParams, SearchSpec, decode_item, decode_search};
pub use registry::{Images, Resource, Works};
