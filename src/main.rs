//! meshport CLI - Inspect and convert 3D geometry files.

use std::env;
use std::path::Path;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use meshport::formats;
use meshport::util::{EventSink, NullSink, TracingSink};
use meshport::Decoded;

/// Verbosity level (thread-safe)
const LOG_QUIET: u8 = 0;
const LOG_INFO: u8 = 1;
const LOG_DEBUG: u8 = 2;

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LOG_INFO);
static TRACE_EVENTS: AtomicBool = AtomicBool::new(false);

/// Decode/transfer events go to the tracing subscriber under --trace,
/// nowhere otherwise.
fn event_sink() -> &'static dyn EventSink {
    if TRACE_EVENTS.load(Ordering::Relaxed) {
        &TracingSink
    } else {
        &NullSink
    }
}

#[inline]
fn log_level() -> u8 {
    LOG_LEVEL.load(Ordering::Relaxed)
}

#[inline]
fn set_log_level(level: u8) {
    LOG_LEVEL.store(level, Ordering::Relaxed);
}

macro_rules! info {
    ($($arg:tt)*) => {
        if log_level() >= LOG_INFO {
            println!("[INFO] {}", format!($($arg)*));
        }
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        if log_level() >= LOG_DEBUG {
            println!("[DEBUG] {}", format!($($arg)*));
        }
    };
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => set_log_level(LOG_DEBUG),
            "-t" | "--trace" => {
                tracing_subscriber::fmt()
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("meshport=trace")),
                    )
                    .init();
                set_log_level(LOG_DEBUG);
                TRACE_EVENTS.store(true, Ordering::Relaxed);
            }
            "-q" | "--quiet" => set_log_level(LOG_QUIET),
            _ => filtered_args.push(arg),
        }
    }

    if filtered_args.is_empty() {
        print_usage(&args[0]);
        return;
    }

    match filtered_args[0] {
        "info" | "i" => {
            if filtered_args.len() < 2 {
                eprintln!("Usage: {} info <file>", args[0]);
                std::process::exit(1);
            }
            cmd_info(filtered_args[1]);
        }
        "convert" | "c" => {
            if filtered_args.len() < 3 {
                eprintln!("Usage: {} convert <input> <output.ply>", args[0]);
                std::process::exit(1);
            }
            cmd_convert(filtered_args[1], filtered_args[2]);
        }
        "help" | "h" | "-h" | "--help" => print_usage(&args[0]),
        _ => {
            // Assume it's a file path
            if Path::new(filtered_args[0]).exists() {
                cmd_info(filtered_args[0]);
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                print_usage(&args[0]);
                std::process::exit(1);
            }
        }
    }
}

fn print_usage(prog: &str) {
    println!("meshport CLI - Inspect and convert 3D geometry files");
    println!();
    println!("Usage: {} [options] <command> <file>", prog);
    println!();
    println!("Commands:");
    println!("  i, info     Sniff and decode a file, print a summary");
    println!("  c, convert  Decode any readable format, write binary PLY");
    println!("  h, help     Show this help");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -t, --trace    Structured decode/transfer events via tracing");
    println!("  -q, --quiet    Suppress output");
}

fn cmd_info(path: &str) {
    info!("Decoding: {}", path);

    let decoded = match formats::decode_file(path, event_sink()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to decode {}: {}", path, e);
            std::process::exit(1);
        }
    };

    match decoded {
        Decoded::Geometry(dataset) => {
            println!("File: {}", dataset.file_name);
            if let Some(format) = dataset.source_format {
                println!("Format: {}", format);
            }
            println!(
                "Vertices: {} decoded of {} declared",
                dataset.decoded_vertices, dataset.vertex_count
            );
            println!("Faces: {}", dataset.faces.len());
            println!(
                "Channels: colors={} normals={}",
                dataset.has_colors(),
                dataset.has_normals()
            );
            if let Some((min, max)) = dataset.compute_bounds() {
                println!("Bounds: {:?} .. {:?}", min, max);
            }
            for comment in &dataset.comments {
                debug!("comment: {}", comment);
            }
        }
        Decoded::Depth(image) => {
            println!("Depth image: {}x{}", image.width, image.height);
            println!("Scale: {}", image.scale);
            let (mut lo, mut hi) = (f32::MAX, f32::MIN);
            for &s in &image.samples {
                lo = lo.min(s);
                hi = hi.max(s);
            }
            println!("Range: {:.3} .. {:.3}", lo, hi);
        }
    }
}

fn cmd_convert(input: &str, output: &str) {
    info!("Converting {} -> {}", input, output);

    let decoded = match formats::decode_file(input, event_sink()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to decode {}: {}", input, e);
            std::process::exit(1);
        }
    };

    let Some(dataset) = decoded.as_geometry() else {
        eprintln!("{} is a depth image; only geometry converts to PLY", input);
        std::process::exit(1);
    };

    debug!(
        "{} vertices, {} faces",
        dataset.decoded_vertices,
        dataset.faces.len()
    );

    let file = match std::fs::File::create(output) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to create {}: {}", output, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = formats::ply::write_to(dataset, std::io::BufWriter::new(file)) {
        eprintln!("Failed to write {}: {}", output, e);
        std::process::exit(1);
    }

    info!("Wrote {}", output);
}
