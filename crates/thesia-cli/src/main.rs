use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use thesia_core::ConfigLoader;

mod app;
mod commands;

#[derive(Parser, Debug)]
#[clap(name = "thesia", author, version, about = "ThesIA thesis proposal assistant")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, default_value = "thesia.yaml", help = "Configuration file (optional)")]
    config: PathBuf,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, help = "AI backend base URL, overriding config and environment")]
    api_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the AI backend and the current session
    Status,
    /// Start the OAuth sign-in flow
    Login,
    /// Finish sign-in with the URL the browser landed on
    Callback { url: String },
    /// Sign out and forget the stored session
    Logout,
    /// Print the saved thesis project
    Show,
    /// Set one project field (title, objective, variables, scope, grade, area, sub-area, level)
    Set { field: String, value: String },
    /// Clear every project field
    Reset,
    /// Evaluate the viability of the thesis idea
    Evaluate,
    /// Validate the academic profile (grade, area, level)
    ValidateProfile,
    /// Analyze a regulations PDF
    Analyze { pdf: PathBuf },
    /// Generate a thesis structure from the title, objective and regulations
    Structure,
    /// Estimate training resources for a model size
    Estimate {
        #[clap(help = "Model parameters, in millions")]
        params_millions: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let mut config = ConfigLoader::load(Some(cli.config.as_path())).await?;
    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url;
        config.validate()?;
    }

    match cli.command {
        Commands::Status => commands::status(config).await,
        Commands::Login => commands::login(config).await,
        Commands::Callback { url } => commands::callback(config, &url).await,
        Commands::Logout => commands::logout(config).await,
        Commands::Show => commands::show(config).await,
        Commands::Set { field, value } => commands::set(config, &field, value).await,
        Commands::Reset => commands::reset(config).await,
        Commands::Evaluate => commands::evaluate(config).await,
        Commands::ValidateProfile => commands::validate_profile(config).await,
        Commands::Analyze { pdf } => commands::analyze(config, &pdf).await,
        Commands::Structure => commands::structure(config).await,
        Commands::Estimate { params_millions } => commands::estimate(config, params_millions).await,
    }
}
