//! Knowdesk CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP gateway and chat frontend
//! - `ask`      — Ask a question, or chat interactively on stdin
//! - `doctor`   — Diagnose configuration and credentials
//! - `config`   — Validate, show or locate the configuration
//! - `onboard`  — Write a default config and a secrets template

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "knowdesk",
    about = "Knowdesk — topic-scoped internal knowledge assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and chat frontend
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the knowledge assistant
    Ask {
        /// Topic to ask about (uipath, worksoft, hr_policies)
        #[arg(short, long, default_value = "uipath")]
        topic: String,

        /// Send a single question instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Diagnose configuration and credentials
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Initialize configuration and secrets template
    Onboard,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate the configuration
    Validate,
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask { topic, message } => commands::ask::run(&topic, message).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_topic_and_message() {
        let cli = Cli::parse_from(["knowdesk", "-v", "ask", "--topic", "worksoft", "-m", "hi"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Ask { topic, message } => {
                assert_eq!(topic, "worksoft");
                assert_eq!(message.as_deref(), Some("hi"));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn parses_serve_port_override() {
        let cli = Cli::parse_from(["knowdesk", "serve", "--port", "9000"]);
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000) }));
    }

    #[test]
    fn parses_config_subcommands() {
        let cli = Cli::parse_from(["knowdesk", "config", "path"]);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
