use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use formscan::{config::load_config, FormReader};
use log::{error, warn};

#[derive(Parser)]
#[clap(version, about = "Read the name fields of a scanned form")]
struct Opts {
    /// Scanned form: JPEG, PNG or PDF.
    image: PathBuf,
    /// Configuration file, instead of formscan.toml in the user config directory.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Indent the JSON output.
    #[clap(short, long)]
    pretty: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let opts = Opts::parse();

    let config = load_config(opts.config.as_deref()).unwrap_or_else(|e| {
        warn!("using default configuration: {:#}", e);
        Default::default()
    });
    let reader = match FormReader::new(config) {
        Ok(reader) => reader,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let extraction = match reader.read(&opts.image) {
        Ok(extraction) => extraction,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let json = if opts.pretty {
        serde_json::to_string_pretty(&extraction)
    } else {
        serde_json::to_string(&extraction)
    };
    match json {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("unable to serialize the result: {}", e);
            ExitCode::FAILURE
        }
    }
}
