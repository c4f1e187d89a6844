use anyhow::{Context, Result};
use catalogue_search::api::{self, AppState};
use catalogue_search::cli::{Cli, Commands, ResourceArg, Settings};
use catalogue_search::engine::ResilientClient;
use catalogue_search::engine::http::ElasticConnector;
use catalogue_search::params::{Images, RawParams, Resource, Works, decode_search};
use catalogue_search::query::color::NormalizedRgb;
use catalogue_search::query::request;
use catalogue_search::{Config, tracing as logging};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        settings,
        log_format,
        command,
    } = Cli::parse();
    logging::init(log_format);

    let config = settings.config();
    match command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&settings, config).await,
        Commands::Request { resource, query } => {
            let body = match resource {
                ResourceArg::Works => compile::<Works>(&config, &query)?,
                ResourceArg::Images => compile::<Images>(&config, &query)?,
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}

async fn serve(settings: &Settings, config: Config) -> Result<()> {
    let connector = ElasticConnector::new(settings.elastic_node.clone(), settings.credentials());
    let client = ResilientClient::connect(Arc::new(connector), config.refresh_cooldown)
        .await
        .context("Failed to connect to the search engine")?;

    info!(
        works_index = %config.works_index,
        images_index = %config.images_index,
        "Search engine client ready"
    );

    let app = api::router(AppState::new(Arc::new(config), Arc::new(client)));
    let listener = tokio::net::TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen))?;
    info!(addr = %settings.listen, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down");
    Ok(())
}

fn compile<R: Resource>(config: &Config, query: &str) -> Result<serde_json::Value> {
    let spec = decode_search::<R>(&RawParams::parse(Some(query)), &config.limits)?;
    let request = request::build(&spec, R::index(config), &NormalizedRgb);
    Ok(serde_json::json!({ "index": request.index, "body": request.body }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
