//! CLI for the imgfilter service.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use imgfilter_core::config::{self, ServerConfig};
use imgfilter_core::logging;
use std::path::PathBuf;

use commands::{run_filter, run_serve};

/// Top-level CLI for the imgfilter service.
#[derive(Debug, Parser)]
#[command(name = "imgfilter")]
#[command(about = "imgfilter: fetch a public image, filter it, serve the result", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the HTTP server (GET /filteredimage?image_url=...).
    Serve {
        /// Port to listen on (overrides config and the PORT environment variable).
        #[arg(long, short)]
        port: Option<u16>,
        /// Interface to bind (overrides config).
        #[arg(long)]
        bind: Option<String>,
        /// Directory for transient artifacts (overrides config).
        #[arg(long, value_name = "DIR")]
        artifact_dir: Option<PathBuf>,
    },

    /// Filter a single image URL and write the result to a file.
    Filter {
        /// Direct HTTP/HTTPS URL of the image.
        url: String,
        /// Where to write the filtered JPEG.
        output: PathBuf,
    },
}

impl CliCommand {
    /// Folds command-line overrides into the loaded config.
    fn apply_overrides(&self, cfg: &mut ServerConfig) {
        if let CliCommand::Serve {
            port,
            bind,
            artifact_dir,
        } = self
        {
            if let Some(port) = port {
                cfg.port = *port;
            }
            if let Some(bind) = bind {
                cfg.bind_host = bind.clone();
            }
            if let Some(dir) = artifact_dir {
                cfg.artifact_dir = Some(dir.clone());
            }
        }
    }

    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load()?;
        cli.command.apply_overrides(&mut cfg);
        logging::init(cfg.log_to_file);
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve { .. } => run_serve(&cfg).await?,
            CliCommand::Filter { url, output } => run_filter(&cfg, &url, &output).await?,
        }

        Ok(())
    }
}
