//! dubsiren - Raspberry Pi dub siren for an external I2S DAC.
//!
//! Run with: cargo run -- --simulate --interactive

mod app;

use clap::Parser;

#[derive(Parser)]
#[command(name = "dubsiren")]
#[command(about = "Dub siren synthesizer for Raspberry Pi + PCM5102 DAC", long_about = None)]
pub struct Cli {
    /// Audio sample rate in Hz
    #[arg(long, default_value_t = 48_000)]
    pub sample_rate: u32,

    /// Frames per audio period
    #[arg(long, default_value_t = 256)]
    pub buffer_size: usize,

    /// Output device name (default: system default output)
    #[arg(long)]
    pub device: Option<String>,

    /// Run without audio or GPIO hardware
    #[arg(long)]
    pub simulate: bool,

    /// Accept commands on stdin instead of running as a daemon
    #[arg(long)]
    pub interactive: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    app::run(cli)
}
