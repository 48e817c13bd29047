use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, LevelFilter};

use sbo_epub::{
    client::{OreillyClient, DEFAULT_USER_AGENT},
    config::{DownloadConfig, DEFAULT_BOOKS_DIR, DEFAULT_COOKIES, DEFAULT_SITE},
    cookies::load_cookies,
    epub::build_epub,
    error::Result,
};

#[derive(Parser, Debug)]
#[command(name = "sbo-epub", author, version, about = "Download O'Reilly books as EPUB")]
struct Cli {
    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a book by its id
    Download {
        book_id: String,

        /// Cookies file exported from a logged in browser session
        #[arg(short, long, default_value = DEFAULT_COOKIES)]
        cookies: PathBuf,

        /// Directory the book folder is created in
        #[arg(short, long, default_value = DEFAULT_BOOKS_DIR)]
        output: PathBuf,

        /// Tweak css for Kindle readers
        #[arg(long)]
        kindle: bool,

        /// Site host or base url, e.g. a library proxy
        #[arg(short, long, default_value = DEFAULT_SITE)]
        site_url: String,
    },
}

fn setup_logger(verbose: bool) -> std::result::Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Red);
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {} {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("sbo_epub", level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

async fn run(config: DownloadConfig) -> Result<()> {
    std::fs::create_dir_all(&config.output)
        .with_context(|| format!("unable to create {}", config.output.display()))?;

    let cookies = load_cookies(&config.cookies)?;
    let client = OreillyClient::new(&cookies, config.base_url()?, DEFAULT_USER_AGENT)?
        .check_login()
        .await?;

    build_epub(&client, &config).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = setup_logger(cli.verbose) {
        eprintln!("Unable to set up logging: {}", err);
    }

    let config = match cli.command {
        Command::Download {
            book_id,
            cookies,
            output,
            kindle,
            site_url,
        } => DownloadConfig {
            book_id,
            cookies,
            output,
            kindle,
            site_url,
        },
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            if err.is_auth() {
                error!("Export fresh cookies from a logged in browser session");
            }
            ExitCode::FAILURE
        }
    }
}
