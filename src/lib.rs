pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod params;
pub mod query;
pub mod tracing;

pub use api::{AppState, router};
pub use config::Config;
pub use engine::{Connection, ConnectionFactory, EngineError, ResilientClient};
pub use error::{ApiError, ValidationError};
