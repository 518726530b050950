//! CAN Layout CLI Application
//!
//! Command-line front end for the can-layout library. It:
//! - Loads a TOML description of types, units, enums and messages
//! - Builds the network through the library API
//! - Describes message layouts
//! - Encodes payloads from configured signal values
//! - Decodes hex payloads, and whole frame files in parallel

use anyhow::{bail, Context, Result};
use can_layout::{Message, Network};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

mod builder;
mod config;
mod report;

use report::FrameReport;

/// CAN Layout - Describe, encode and decode CAN message layouts
#[derive(Parser, Debug)]
#[command(name = "can-layout-cli")]
#[command(about = "Describe, encode and decode CAN message layouts", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the layout description (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Message to work on, by name or CAN id (e.g. 0x100)
    #[arg(short, long, value_name = "MESSAGE")]
    message: Option<String>,

    /// Print the layout tree of the selected messages
    #[arg(long)]
    describe: bool,

    /// Print the payload encoded from configured signal values
    #[arg(long)]
    encode: bool,

    /// Hex payload to decode with the selected message (can be repeated)
    #[arg(short, long, value_name = "HEX")]
    decode: Vec<String>,

    /// File of frames to decode, one `ID#PAYLOAD` per line
    #[arg(long, value_name = "FILE")]
    frames: Option<PathBuf>,

    /// Print decodings as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Layout CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using layout library v{}", can_layout::VERSION);

    let config = config::load_config(&args.config)?;
    let name = args
        .config
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("network");
    let network = builder::build_network(name, &config)
        .with_context(|| format!("Failed to build layouts from {:?}", args.config))?;

    let selected = select_messages(&network, args.message.as_deref())?;
    let nothing_requested = !args.describe && !args.encode && args.decode.is_empty() && args.frames.is_none();

    if args.describe || nothing_requested {
        for message in &selected {
            println!("{}", report::describe_message(message));
        }
    }

    if args.encode {
        for message in &selected {
            println!("{} (0x{:X}): {}", message.name(), message.can_id(), report::format_hex(&message.encode()));
        }
    }

    if !args.decode.is_empty() {
        let [message] = selected.as_slice() else {
            bail!("--decode needs exactly one message; select it with --message");
        };
        let reports = args
            .decode
            .iter()
            .map(|hex| Ok(FrameReport::new(message, &report::parse_hex(hex)?)))
            .collect::<Result<Vec<_>>>()?;
        println!("{}", report::render_frames(&reports, args.json)?);
    }

    if let Some(path) = &args.frames {
        let reports = decode_frames(&network, path)?;
        println!("{}", report::render_frames(&reports, args.json)?);
    }

    Ok(())
}

/// Messages matching `selector`, or every message when it is `None`
fn select_messages<'a>(network: &'a Network, selector: Option<&str>) -> Result<Vec<&'a Message>> {
    let all = network.buses().iter().flat_map(|bus| bus.messages());
    let Some(selector) = selector else {
        return Ok(all.collect());
    };

    let can_id = selector
        .strip_prefix("0x")
        .or_else(|| selector.strip_prefix("0X"))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok());
    let selected: Vec<&Message> = all
        .filter(|m| m.name() == selector || Some(m.can_id()) == can_id)
        .collect();

    if selected.is_empty() {
        bail!("No message named or with CAN id {:?}", selector);
    }
    Ok(selected)
}

/// Decode every frame of a frame file, in parallel
fn decode_frames(network: &Network, path: &Path) -> Result<Vec<FrameReport>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read frames file: {:?}", path))?;

    let frames = content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            report::parse_frame_line(line)
                .with_context(|| format!("{:?} line {}", path, i + 1))
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    log::info!("Decoding {} frames from {:?}", frames.len(), path);

    let reports: Vec<FrameReport> = frames
        .par_iter()
        .filter_map(|(can_id, data)| {
            let message = network
                .buses()
                .iter()
                .find_map(|bus| bus.message_by_can_id(*can_id));
            if message.is_none() {
                log::warn!("No message with CAN id 0x{:X}, skipping frame", can_id);
            }
            message.map(|m| FrameReport::new(m, data))
        })
        .collect();
    Ok(reports)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
