// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Simulate Options:
    --frames <N>              Animation frames to run [default: 120]
    --width <W>, --height <H> Intrinsic video size [default: 1280x720]
    --rect <L,T,W,H>          Video box on the page [default: 0,0,640,360]
    --swap-at <FRAME>         Replace the video element at this frame
    --swap-size <WxH>         Intrinsic size of the replacement [default: 1920x1080]
    --fail-first <N>          Reject the first N estimates [default: 0]
    --config <TOML>           Overlay configuration file
    --save <PNG>              Save the final overlay raster
    --show                    Display the overlay in a window
    --verbose                 Show verbose output

Examples:
    pose-overlay simulate
    pose-overlay simulate --frames 300 --swap-at 120 --swap-size 1920x1080
    pose-overlay simulate --rect 100,200,640,360 --fail-first 3 --save overlay.png
    pose-overlay simulate --config overlay.toml --show"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an overlay session against a simulated page
    Simulate(SimulateArgs),
}

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Animation frames to run
    #[arg(long, default_value_t = 120)]
    pub frames: u64,

    /// Intrinsic video width
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Intrinsic video height
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Video box on the page as left,top,width,height
    #[arg(long, default_value = "0,0,640,360", value_parser = parse_rect)]
    pub rect: [f64; 4],

    /// Replace the video element at this frame
    #[arg(long)]
    pub swap_at: Option<u64>,

    /// Intrinsic size of the replacement video as WIDTHxHEIGHT
    #[arg(long, default_value = "1920x1080", value_parser = parse_size)]
    pub swap_size: (u32, u32),

    /// Reject the first N estimates
    #[arg(long, default_value_t = 0)]
    pub fail_first: u64,

    /// Overlay configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Save the final overlay raster as PNG
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Display the overlay in a window
    #[arg(long, default_value_t = false)]
    pub show: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

fn parse_rect(s: &str) -> Result<[f64; 4], String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    <[f64; 4]>::try_from(parts)
        .map_err(|_| format!("expected left,top,width,height but got '{s}'"))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT but got '{s}'"))?;
    let w = w.trim().parse().map_err(|e| format!("'{w}': {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("'{h}': {e}"))?;
    Ok((w, h))
}
