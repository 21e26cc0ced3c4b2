mod anomaly;
mod app;
mod config;
mod data;
mod error;
mod forecast;
mod gui;
mod pipeline;
mod validation;
mod viewport;

use anomaly::ZScoreDetector;
use app::App;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use config::AppConfig;
use forecast::TrendForecaster;
use pipeline::Pipeline;
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, ValueEnum)]
enum GuiRendererChoice {
    Auto,
    Wgpu,
    Glow,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stockcast: stock price forecasting with anomaly detection and an interactive chart",
    after_help = "EXAMPLES:
    # Launch against Yahoo Finance
    cargo run --release

    # Launch with synthetic prices, no network access
    cargo run --release -- --offline

    # Pin the latest allowed end date
    cargo run --release -- --as-of 2025-05-02"
)]
struct Args {
    /// Latest allowed end date (YYYY-MM-DD). Defaults to STOCKCAST_AS_OF or today (UTC).
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,

    /// Use generated prices instead of Yahoo Finance
    #[arg(long)]
    offline: bool,

    /// GUI renderer backend (auto|wgpu|glow). Useful for RDP compatibility.
    #[arg(long, value_enum, default_value_t = GuiRendererChoice::Wgpu)]
    gui_renderer: GuiRendererChoice,

    /// Enable GUI safe mode for remote desktop (disables vsync/MSAA and hardware acceleration).
    #[arg(long)]
    gui_safe_mode: bool,
}

fn parse_as_of(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

#[tokio::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("stockcast=info,wgpu_core=error,wgpu_hal=error")
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();
    let args = Args::parse();

    let config = AppConfig::resolve(args.as_of, args.offline);
    let pipeline = Pipeline {
        source: data::source_for(&config),
        detector: Arc::new(ZScoreDetector::default()),
        forecaster: Arc::new(TrendForecaster::default()),
    };

    let mut options = eframe::NativeOptions::default();
    options.viewport = egui::ViewportBuilder::default()
        .with_inner_size([1200.0, 900.0])
        .with_min_inner_size([800.0, 600.0]);
    options.renderer = match args.gui_renderer {
        GuiRendererChoice::Auto => eframe::Renderer::Wgpu,
        GuiRendererChoice::Wgpu => eframe::Renderer::Wgpu,
        GuiRendererChoice::Glow => eframe::Renderer::Glow,
    };

    if args.gui_safe_mode {
        options.vsync = false;
        options.multisampling = 0;
        options.depth_buffer = 0;
        options.stencil_buffer = 0;
        options.hardware_acceleration = eframe::HardwareAcceleration::Off;
    }

    info!(
        "Launching GUI with renderer: {:?}, safe_mode={}, provider={}, as_of={}",
        args.gui_renderer,
        args.gui_safe_mode,
        config.provider.as_str(),
        config.as_of
    );
    eframe::run_native(
        "Stock Price Predictor",
        options,
        Box::new(|_cc| Ok(Box::new(gui::GuiApp::new(App::new(config, pipeline))))),
    ).map_err(|e| io::Error::other(e.to_string()))?;

    Ok(())
}
