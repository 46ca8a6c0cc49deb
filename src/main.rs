use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use facecam::Config;

/// Stream webcam frames to a face-learning server and follow the faces it finds.
///
/// While running, type commands on stdin:
///   label <id|row> <name>   rename a person
///   train <id|row> on|off   collect training samples for one person
///   list                    print the roster
///   stop                    close the connection and exit
#[derive(Parser)]
#[command(name = "facecam", verbatim_doc_comment)]
struct Cli {
    /// Websocket address of the face-learning server
    #[arg(long)]
    url: Option<String>,

    /// V4L2 camera device
    #[arg(long)]
    device: Option<String>,

    /// Camera capture width
    #[arg(long)]
    capture_width: Option<u32>,

    /// Camera capture height
    #[arg(long)]
    capture_height: Option<u32>,

    /// Camera frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Width of the frames sent to the server
    #[arg(long)]
    width: Option<u32>,

    /// Height of the frames sent to the server
    #[arg(long)]
    height: Option<u32>,

    /// JPEG quality, 1-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Milliseconds between send attempts
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,

    /// Frames allowed in flight before the first acknowledgement
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    credit: Option<u32>,

    /// Color scheme sent to the server: Paired, Set1, Set3 or Dark2
    #[arg(long)]
    palette: Option<String>,

    /// Number of palette colors
    #[arg(long)]
    palette_size: Option<usize>,

    /// Write the roster to this HTML file (refreshes itself every second)
    #[arg(long)]
    html: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            url: self.url.unwrap_or(defaults.url),
            device: self.device.unwrap_or(defaults.device),
            capture_width: self.capture_width.unwrap_or(defaults.capture_width),
            capture_height: self.capture_height.unwrap_or(defaults.capture_height),
            fps: self.fps.unwrap_or(defaults.fps),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            quality: self.quality.unwrap_or(defaults.quality),
            interval: self
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            initial_credit: self.credit.unwrap_or(defaults.initial_credit),
            palette_scheme: self.palette.unwrap_or(defaults.palette_scheme),
            palette_size: self.palette_size.unwrap_or(defaults.palette_size),
            html: self.html.or(defaults.html),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config();
    if let Err(err) = facecam::start(&config) {
        log::error!("{err:#}");
        process::exit(1);
    }
}
