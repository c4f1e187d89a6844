//! Runtime configuration.

use crate::params::Limits;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PUBLIC_ROOT: &str = "https://api.wellcomecollection.org/catalogue/v2";
pub const DEFAULT_PIPELINE_DATE: &str = "2025-10-02";
pub const DEFAULT_WORKS_INDEX_DATE: &str = "2025-11-20";
pub const DEFAULT_IMAGES_INDEX_DATE: &str = "2025-10-02";

#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL that pagination and redirect links are built on.
    pub public_root_url: Url,
    pub pipeline_date: String,
    pub works_index: String,
    pub images_index: String,
    pub limits: Limits,
    /// Minimum interval between engine connection refreshes.
    pub refresh_cooldown: Duration,
}

impl Config {
    pub fn new(
        public_root_url: Url,
        pipeline_date: impl Into<String>,
        works_index_date: &str,
        images_index_date: &str,
    ) -> Self {
        Self {
            public_root_url,
            pipeline_date: pipeline_date.into(),
            works_index: format!("works-indexed-{works_index_date}"),
            images_index: format!("images-indexed-{images_index_date}"),
            limits: Limits::default(),
            refresh_cooldown: crate::engine::resilient::DEFAULT_COOLDOWN,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            Url::parse(DEFAULT_PUBLIC_ROOT).expect("default public root is a valid URL"),
            DEFAULT_PIPELINE_DATE,
            DEFAULT_WORKS_INDEX_DATE,
            DEFAULT_IMAGES_INDEX_DATE,
        )
    }
}
