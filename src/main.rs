use ble_advert_data::app::{Options, RunError, run_with_io};
use ble_advert_data::config::{Config, ConfigError};
use ble_advert_data::logging;
use ble_advert_data::source::{Clock, JsonLinesSource, SourceError};
use clap::Parser;
use std::panic::{self, PanicHookInfo};
use thiserror::Error;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

#[derive(Error, Debug)]
enum MainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Run(#[from] RunError),
}

/// Load the configuration, open the input and run until it is exhausted.
async fn run(options: Options) -> Result<(), MainError> {
    let config = Config::load(&options.config)?;
    tracing::info!(
        path = %options.config.display(),
        devices = config.devices.len(),
        "configuration loaded"
    );

    let clock = Clock::start();
    let source = match &options.input {
        Some(path) => JsonLinesSource::open(path, clock).await?,
        None => JsonLinesSource::stdin(clock),
    };

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    run_with_io(options, config, &source, &mut out, &mut err).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd, Telegraf execd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    logging::init(options.verbose);

    match run(options).await {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
