// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use image_anonymizer::{
    cli::Cli,
    config::AnonymizerConfig,
    start_server,
    version,
    vision::sam::Sam2Loader,
    AppState, SegmentationModelManager,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.apply(AnonymizerConfig::from_env());
    config.validate().map_err(anyhow::Error::msg)?;

    tracing::info!("📦 {}", version::get_version_string());
    tracing::info!(
        "Model dir: {}, box divisor: {}, min confidence: {:?}",
        config.model_dir.display(),
        config.box_divisor,
        config.min_confidence
    );

    // Load the model before accepting requests
    let loader = Arc::new(Sam2Loader::new(config.sam_config()));
    let model_manager = Arc::new(SegmentationModelManager::new(loader));
    model_manager.initialize().await?;

    let state = Arc::new(AppState::from_config(&config, model_manager));
    start_server(&config, state).await
}
