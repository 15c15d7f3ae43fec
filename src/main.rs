mod app;
mod catalog;
mod config;
mod controller;
mod images;
mod launch;
mod presentation;
mod query;
mod renderer;
mod specimen;
mod viewer;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing_subscriber::EnvFilter;

use crate::catalog::CatalogClient;
use crate::config::{ApiConfig, DEFAULT_API_PATH};
use crate::launch::LaunchOptions;
use crate::query::DEFAULT_PAGE_LIMIT;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Logging unavailable: {err}");
    }
}

fn catalog_client(api_override: Option<&str>) -> anyhow::Result<CatalogClient> {
    let api = ApiConfig::resolve(api_override)?;
    let client = CatalogClient::new(&api.base_url)
        .with_context(|| format!("Could not use catalog API at {}", api.base_url))?;
    log::info!("Catalog API at {} ({:?})", client.base_url(), api.source);
    Ok(client)
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut status = Vec::new();
    let options = match launch::parse_launch_options_from_args(&cli_args) {
        Ok(options) => options,
        Err(err) => {
            log::warn!("Ignoring launch arguments: {err}");
            status.push(format!("Launch args error: {err}"));
            LaunchOptions::default()
        }
    };

    let client = match catalog_client(options.api_url.as_deref()) {
        Ok(client) => client,
        Err(err) => {
            log::warn!("{err:#}; falling back to {DEFAULT_API_PATH}");
            status.push(format!("API URL error: {err}"));
            catalog_client(Some(DEFAULT_API_PATH))?
        }
    };
    let initial_query = options.initial_query(DEFAULT_PAGE_LIMIT);
    let initial_status = (!status.is_empty()).then(|| status.join(" | "));

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 480.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "Specimen Browser",
        native_options,
        Box::new(move |_cc| {
            Ok(Box::new(app::SpecimenBrowserApp::new(
                Arc::new(client),
                initial_query,
                initial_status,
            )))
        }),
    )
    .map_err(|err| anyhow!("Specimen Browser exited with an error: {err}"))
}
