use crate::config::{
    Config, DEFAULT_IMAGES_INDEX_DATE, DEFAULT_PIPELINE_DATE, DEFAULT_PUBLIC_ROOT,
    DEFAULT_WORKS_INDEX_DATE,
};
use crate::engine::http::Credentials;
use crate::tracing::LogFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "catalogue-search")]
#[command(about = "Public search API over the works and images catalogue", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "compact", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API (the default).
    Serve,
    /// Print the engine request a query string compiles to, without running it.
    Request {
        #[arg(value_enum)]
        resource: ResourceArg,
        /// Raw query string, e.g. `query=bats&aggregations=workType`.
        #[arg(default_value = "")]
        query: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceArg {
    Works,
    Images,
}

#[derive(Debug, Args)]
pub struct Settings {
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000", global = true)]
    pub listen: SocketAddr,

    #[arg(long, env = "PUBLIC_ROOT_URL", default_value = DEFAULT_PUBLIC_ROOT, global = true)]
    pub public_root_url: Url,

    #[arg(long, env = "PIPELINE_DATE", default_value = DEFAULT_PIPELINE_DATE, global = true)]
    pub pipeline_date: String,

    #[arg(long, env = "INDEX_DATE_WORKS", default_value = DEFAULT_WORKS_INDEX_DATE, global = true)]
    pub index_date_works: String,

    #[arg(long, env = "INDEX_DATE_IMAGES", default_value = DEFAULT_IMAGES_INDEX_DATE, global = true)]
    pub index_date_images: String,

    #[arg(long, env = "ELASTIC_NODE", default_value = "http://localhost:9200", global = true)]
    pub elastic_node: Url,

    #[arg(long, env = "ELASTIC_API_KEY", hide_env_values = true, global = true)]
    pub elastic_api_key: Option<String>,

    #[arg(long, env = "ELASTIC_API_KEY_FILE", conflicts_with = "elastic_api_key", global = true)]
    pub elastic_api_key_file: Option<PathBuf>,

    #[arg(long, env = "REFRESH_COOLDOWN_MS", default_value_t = 2000, global = true)]
    pub refresh_cooldown_ms: u64,
}

impl Settings {
    pub fn config(&self) -> Config {
        let mut config = Config::new(
            self.public_root_url.clone(),
            self.pipeline_date.clone(),
            &self.index_date_works,
            &self.index_date_images,
        );
        config.refresh_cooldown = Duration::from_millis(self.refresh_cooldown_ms);
        config
    }

    pub fn credentials(&self) -> Credentials {
        match (&self.elastic_api_key, &self.elastic_api_key_file) {
            (Some(key), _) => Credentials::ApiKey(key.clone()),
            (None, Some(path)) => Credentials::ApiKeyFile(path.clone()),
            (None, None) => Credentials::Anonymous,
        }
    }
}
