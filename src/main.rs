// src/main.rs
mod gui;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dual_adc_analyzer::{AnalyzerConfig, AnalyzerSession};
use eframe::egui;

/// Real-time dual ADC signal analyzer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// CSV with adc1/adc2 columns, or a .json cache written by an earlier load
    data_path: Option<PathBuf>,

    /// JSON file overriding the default analyzer settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peak threshold for the first run (overrides the config file)
    #[arg(short, long)]
    threshold: Option<f64>,
}

impl Args {
    fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        let mut config = match &self.config {
            Some(path) => AnalyzerConfig::from_json_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => AnalyzerConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        Ok(config)
    }
}

// 入口函数
fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.analyzer_config()?;
    log::info!(
        "sample rate {} Hz, display {} s, chunk size {}",
        config.sample_rate,
        config.display_time,
        config.chunk_size
    );
    let session = AnalyzerSession::new(config).context("invalid analyzer configuration")?;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([900.0, 560.0])
        .with_title("Real-Time Dual ADC Signal Analyzer");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let data_path = args
        .data_path
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    eframe::run_native(
        "dual-adc-analyzer",
        options,
        Box::new(move |_cc| Box::new(gui::AnalyzerApp::new(session, data_path))),
    )
    .map_err(|e| anyhow!("viewer failed: {e}"))
}
