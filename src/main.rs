use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;

use piwigo_digikam::config::Config;
use piwigo_digikam::logging;
use piwigo_digikam::transfer::{self, TransferEvent, TransferProgress};

/// Command-line overrides for the config file.
#[derive(Debug, Default)]
struct Args {
    config_path: Option<PathBuf>,
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    output_dir: Option<PathBuf>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("piwigo-digikam {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" | "--url" | "-u" | "--user" | "--password" | "--output"
            | "-o" => {
                let Some(value) = args.get(i + 1).cloned() else {
                    eprintln!("Error: {} requires a value", flag);
                    std::process::exit(1);
                };
                match flag {
                    "--config" | "-c" => parsed.config_path = Some(PathBuf::from(value)),
                    "--url" | "-u" => parsed.url = Some(value),
                    "--user" => parsed.username = Some(value),
                    "--password" => parsed.password = Some(value),
                    _ => parsed.output_dir = Some(PathBuf::from(value)),
                }
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", flag);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"piwigo-digikam - copy a Piwigo gallery into a digiKam collection

USAGE:
    piwigo-digikam [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --url, -u URL       Piwigo base URL (e.g. https://photos.example.com)
    --user NAME         Piwigo user name
    --password PASS     Piwigo password (prefer PIWIGO_PASSWORD)
    --output, -o DIR    Destination directory for images and digikam4.db
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PIWIGO_DIGIKAM_CONFIG   Path to config file (overrides default location)
    PIWIGO_PASSWORD         Password used when none is configured
    PIWIGO_DIGIKAM_LOG      Log filter, overrides [logging] level (trace, debug, info, ...)

Config file location: $XDG_CONFIG_HOME/piwigo-digikam/config.toml"#
    );
}

fn load_config(args: Args) -> Result<Config> {
    let mut config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(url) = args.url {
        config.gallery.url = url;
    }
    if let Some(username) = args.username {
        config.gallery.username = username;
    }
    if let Some(password) = args.password {
        config.gallery.password = password;
    }
    if let Some(output_dir) = args.output_dir {
        config.collection.output_dir = output_dir;
    }
    config.apply_env();

    Ok(config)
}

fn print_status(message: &str) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), message);
}

fn print_progress(progress: &TransferProgress) {
    println!(
        "Progress: {} / {} ({}%) - Success: {}, Failed: {}",
        progress.processed, progress.total, progress.percent(), progress.succeeded, progress.failed
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    let config = load_config(args)?;

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    print_status("Starting transfer...");
    print_status(&format!("Piwigo URL: {}", config.gallery.url));
    print_status(&format!(
        "Output Directory: {}",
        config.collection.output_dir.display()
    ));

    let handle = transfer::spawn(&config).context("Cannot start transfer")?;

    for event in handle.events() {
        match event {
            TransferEvent::Status(message) => print_status(&message),
            TransferEvent::Progress(progress) => print_progress(&progress),
            TransferEvent::State(state) => tracing::debug!("State: {}", state.display_name()),
        }
    }

    let elapsed = handle.elapsed();
    let summary = handle.join().context("Transfer failed")?;

    print_status(&format!(
        "Finished in {}s: {} transferred, {} failed, {} skipped",
        elapsed.as_secs(),
        summary.succeeded,
        summary.failed,
        summary.skipped
    ));
    for failure in &summary.failures {
        println!("  image {} ({}): {}", failure.image_id, failure.name, failure.error);
    }

    Ok(())
}
