//! CLI command definitions and subcommands

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable holding the access token
pub const TOKEN_ENV: &str = "TRIPSYNC_TOKEN";

/// Environment variable holding the login password
pub const PASSWORD_ENV: &str = "TRIPSYNC_PASSWORD";

/// TripSync - AI trip planning from the terminal
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Plan trips, revise itineraries, and track activities with an AI travel assistant",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Access token (falls back to TRIPSYNC_TOKEN)
    #[arg(short = 't', long, global = true, help = "Access token (falls back to TRIPSYNC_TOKEN)")]
    pub token: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and print an access token
    Login {
        /// Account username
        username: String,

        /// Password (falls back to TRIPSYNC_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Chat with the travel assistant (interactive without a message)
    Chat {
        /// Resume an existing conversation by id
        #[arg(long)]
        conversation: Option<i64>,

        /// One-shot message; omit for an interactive session
        message: Option<String>,
    },

    /// List conversations
    Conversations {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the message history of a conversation
    History {
        /// Conversation id
        conversation: i64,
    },

    /// Generate a new itinerary
    Plan {
        /// Where to go
        destination: String,

        /// Trip start date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Trip end date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Total budget
        #[arg(short, long)]
        budget: Option<f64>,

        /// Number of travelers
        #[arg(long, default_value = "1")]
        travelers: u32,

        /// Preferences passed to the generation model
        #[arg(short, long)]
        requests: Option<String>,
    },

    /// List itineraries
    Itineraries {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one itinerary day by day
    Show {
        /// Itinerary id
        itinerary: i64,
    },

    /// Revise an itinerary with natural-language instructions
    Revise {
        /// Itinerary id
        itinerary: i64,

        /// What to change
        instructions: String,
    },

    /// Toggle an activity's completion mark
    Toggle {
        /// Itinerary id
        itinerary: i64,

        /// Day number, 1-indexed
        day: u32,

        /// Activity index within the day, 0-indexed
        index: u32,

        /// Note to attach to the mark
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show activity completion progress for an itinerary
    Progress {
        /// Itinerary id
        itinerary: i64,
    },

    /// List notifications
    Notifications {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a notification as read
    Read {
        /// Notification id
        id: i64,
    },
}

/// Resolve the access token from the flag or the environment
pub fn resolve_token(flag: Option<String>) -> Option<String> {
    debug!(from_flag = flag.is_some(), "resolve_token: called");
    flag.or_else(|| std::env::var(TOKEN_ENV).ok())
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripsync")
        .join("logs")
        .join("tripsync.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with auth status and log path
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let token_set = std::env::var(TOKEN_ENV).is_ok();
    let log_path = get_log_path();

    let mut help = String::new();

    // Auth section
    help.push_str("Auth:\n");
    let icon = if token_set {
        debug!("generate_after_help: token is set");
        "\u{2705}"
    } else {
        debug!("generate_after_help: token is not set");
        "\u{274C}"
    };
    let status = if token_set {
        format!("{} is set", TOKEN_ENV)
    } else {
        format!("{} is not set (run: tp login <username>)", TOKEN_ENV)
    };
    help.push_str(&format!("  {} {}\n", icon, status));

    // Log path
    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", log_path.display()));

    debug!("generate_after_help: returning help text");
    help
}

/// Output format for listing commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => {
                debug!("OutputFormat::from_str: matched Text");
                Ok(Self::Text)
            }
            "json" => {
                debug!("OutputFormat::from_str: matched Json");
                Ok(Self::Json)
            }
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
