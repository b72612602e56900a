//! Rentcart command-line front-end
//!
//! Drives a persisted equipment selection from the terminal: add picks,
//! adjust quantities, quote a rental period and submit the batch.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rentcart::RentcartConfig;
use rentcart_ids::ProjectId;
use tracing::error;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "rentcart", about = "Equipment selection and batch booking for AV rentals")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Project the selection belongs to (omit for the global selection)
    #[arg(short = 'p', long, global = true)]
    project: Option<String>,

    /// Selection preset: booking, scan or quick
    #[arg(long, global = true, default_value = "booking")]
    preset: String,

    /// Config file (defaults to ~/.rentcart/rentcart.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add equipment to the selection
    Add {
        /// Catalog id of the equipment
        equipment_id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Serial number of an individually tracked unit
        #[arg(short, long)]
        serial: Option<String>,

        /// Units to add (ignored for serialized units)
        #[arg(short, long)]
        quantity: Option<u32>,

        /// Daily rental rate
        #[arg(long, default_value = "0")]
        rate: String,

        /// Replacement cost per unit
        #[arg(long, default_value = "0")]
        replacement_cost: String,

        /// Item-specific rental start (overrides the booking period)
        #[arg(long)]
        start: Option<String>,

        /// Item-specific rental end
        #[arg(long)]
        end: Option<String>,
    },

    /// Remove an entry from the selection
    Remove {
        equipment_id: String,

        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Set an entry's quantity (0 or below removes it)
    Qty {
        equipment_id: String,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,

        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Show the selection
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Empty the selection
    Clear,

    /// Show storage diagnostics
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Price the selection for a rental period
    Quote {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Book the selection for a client
    Submit {
        #[arg(long)]
        client: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Check availability of every entry before booking
        #[arg(long)]
        check_availability: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = rentcart_logging::init_logging(rentcart_logging::LogConfig {
        app_name: "rentcart",
        verbose: cli.verbose,
        quiet_console: true,
    }) {
        eprintln!("warning: logging disabled: {:#}", err);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => RentcartConfig::load(path),
        None => RentcartConfig::load_default(),
    }
    .context("Failed to load configuration")?;

    let project = cli
        .project
        .as_deref()
        .map(ProjectId::parse)
        .transpose()
        .context("Invalid --project")?;
    let mut session = cli::Session::open(&config, &cli.preset, project)?;

    match cli.command {
        Commands::Add {
            equipment_id,
            name,
            serial,
            quantity,
            rate,
            replacement_cost,
            start,
            end,
        } => cli::selection::add(
            &mut session,
            cli::selection::AddArgs {
                equipment_id,
                name,
                serial,
                quantity,
                rate,
                replacement_cost,
                start,
                end,
            },
        ),
        Commands::Remove {
            equipment_id,
            serial,
        } => cli::selection::remove(&mut session, &equipment_id, serial.as_deref()),
        Commands::Qty {
            equipment_id,
            quantity,
            serial,
        } => cli::selection::set_quantity(&mut session, &equipment_id, serial.as_deref(), quantity),
        Commands::List { json } => cli::selection::list(&session, json),
        Commands::Clear => cli::selection::clear(&mut session),
        Commands::Info { json } => cli::selection::info(&session, json),
        Commands::Quote { start, end, json } => cli::booking::quote(&session, &start, &end, json),
        Commands::Submit {
            client,
            start,
            end,
            check_availability,
            json,
        } => {
            cli::booking::submit(
                &mut session,
                &config,
                cli::booking::SubmitArgs {
                    client,
                    start,
                    end,
                    check_availability,
                    json,
                },
            )
            .await
        }
    }
}
