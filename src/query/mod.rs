//! Compilation of decoded requests into engine queries, and of engine
//! results back into response shapes.

pub mod aggregation;
pub mod buckets;
pub mod color;
pub mod filter;
pub mod request;
pub mod reshape;
pub mod template;

pub use request::{GetRequest, SearchRequest};
