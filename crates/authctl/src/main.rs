//! authctl - inspect and drive client authentication state.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::Globals;
use std::path::PathBuf;

/// authctl - Reconcile and inspect the local authentication session.
#[derive(Parser)]
#[command(name = "authctl")]
#[command(about = "Client authentication state for the authsync backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config, session and logs (default ~/.authsync)
    #[arg(long, global = true, env = "AUTHSYNC_HOME")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check authentication status
    Status,

    /// Login with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Logout and clear session
    Logout,

    /// Sign in through the identity provider in a browser
    FederatedLogin {
        /// Provider sign-in page; receives `redirect_uri`
        #[arg(long, env = "AUTHSYNC_SIGN_IN_URL")]
        sign_in_url: String,
        /// Print the URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Print every auth state change until interrupted
    Watch,

    /// Show the signed-in user's profile
    Profile,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let globals = Globals {
        base_dir: cli.base_dir,
        log_level: cli.log_level,
    };
    let format = cli.format;

    let result = match cli.command {
        Commands::Status => commands::status(&globals, &format).await,
        Commands::Login { email, password } => {
            commands::login(&globals, email, password, &format).await
        }
        Commands::Register {
            name,
            email,
            password,
        } => commands::register(&globals, name, email, password, &format).await,
        Commands::Logout => commands::logout(&globals, &format).await,
        Commands::FederatedLogin {
            sign_in_url,
            no_browser,
        } => commands::federated_login(&globals, &sign_in_url, no_browser, &format).await,
        Commands::Watch => commands::watch(&globals, &format).await,
        Commands::Profile => commands::profile(&globals, &format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}
