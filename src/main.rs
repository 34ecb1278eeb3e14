mod app;
mod client;
mod config;
mod encoder;
mod error;
mod export;
mod generation;
mod prompt;
mod state;
mod upload;

use anyhow::Context;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::FlashEditApp;
use client::{GeminiClient, ImageEditor, Unconfigured};
use config::Config;

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let initial_image = std::env::args().nth(1).map(PathBuf::from);
    if let Some(ref path) = initial_image {
        if !path.exists() {
            eprintln!("File not found: {}", path.display());
            std::process::exit(1);
        }
    }

    let config = Config::load_or_default();
    if let Ok(path) = Config::config_path() {
        if !path.exists() {
            match config.save() {
                Ok(()) => info!("Wrote default config to {}", path.display()),
                Err(e) => warn!("Could not write default config: {:#}", e),
            }
        }
    }
    let editor: Arc<dyn ImageEditor> = match GeminiClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("Gemini client unavailable: {}", e);
            Arc::new(Unconfigured::new(e.to_string()))
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    info!("FlashEdit starting with model {}", config.model);

    let title = "FlashEdit AI";
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([720.0, 560.0])
            .with_title(title),
        ..Default::default()
    };

    let handle = runtime.handle().clone();
    let export_file_name = config.export_file_name.clone();
    eframe::run_native(
        title,
        options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            let mut app = FlashEditApp::new(editor, handle, export_file_name);
            if let Some(path) = initial_image {
                app.open_path(&cc.egui_ctx, &path);
            }
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run eframe: {}", e))?;

    runtime.shutdown_background();
    Ok(())
}
