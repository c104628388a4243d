//! This module defines the main functionality of mutascan, an HTTP front end for a mutant/wild-type detection model.

use mutascan::module; // Import the module submodule that contains other modules
use mutascan::module::define; // Import the define module that contains constants and types
use mutascan::module::error::{Error, Result};
use mutascan::module::util::init::resource::init; // Import the resource initialization function
use clap::Parser;
use std::process::ExitCode;

/// Serve the detection model over HTTP.
#[derive(Parser, Debug)]
#[command(name = "mutascan")]
#[command(about = "Serves the mutaSCAN detection model over HTTP", long_about = None)]
struct Args {
    /// Directory holding conf.toml and the log directory
    #[arg(long, default_value = define::system::DEFAULT_DATA_DIR)]
    data_dir: String,
}

// The main function of mutascan
pub fn main() -> ExitCode {
    let args = Args::parse();

    // Prepare the resources by initializing the property struct
    let property = match init(&args.data_dir) {
        Ok(property) => property,
        Err(e) => {
            eprintln!("Can't prepare resources in {}: {}", args.data_dir, e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize the logging system with the log directory and the system name
    if let Err(e) = init_log(
        &property.path.dir.log,
        define::system::NAME,
        &property.conf.system.log_level,
    ) {
        eprintln!("Can't initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    log::info!("Starting mutascan...");
    if property.conf_created {
        log::info!(
            "Wrote default config to {}",
            module::util::path::join(&[&property.path.dir.data, define::path::CONF_FILE])
        );
    }

    match serve(&property) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("mutascan stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads the model once and serves requests with it.
fn serve(property: &module::util::init::MutascanProperty) -> Result<()> {
    let vision = module::vision::MutascanVision::from_conf(&property.conf.model)?;
    module::server::run(property, vision)
}

/// This function initializes the logger system using the log4rs crate.
///
/// # Arguments
/// * `dir` - The directory where the log file will be stored
/// * `name` - The name of the log file
/// * `level` - Root level filter, e.g. `info`
///
/// # Log Example
/// ```ignore
/// log::debug!("Debug Message"); // Log a debug message
/// log::info!("Info Message"); // Log an info message
/// log::warn!("Warning Message"); // Log a warning message
/// log::error!("Error Message"); // Log an error message
/// ```
fn init_log(dir: &str, name: &str, level: &str) -> Result<()> {
    use mutascan::module::util::path::join;
    use log::LevelFilter;
    use log4rs::append::console::ConsoleAppender;
    use log4rs::append::file::FileAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let level: LevelFilter = level
        .parse()
        .map_err(|_| Error::Config(format!("unknown log level '{}'", level)))?;

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} - {l}: {m}{n}")))
        .build(join(&[dir, &format!("{}.log", name)]))?;
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({d} - {l}: {m}{n})}")))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(
            Root::builder()
                .appender("logfile")
                .appender("stdout")
                .build(level),
        )
        .map_err(|e| Error::Config(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| Error::Config(e.to_string()))?;
    Ok(())
}
