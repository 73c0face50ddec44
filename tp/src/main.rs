//! TripSync - AI trip planning from the terminal
//!
//! CLI entry point for chatting with the assistant and managing itineraries.

use std::fs;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use tripsync::cli::{
    Cli, Command, OutputFormat, PASSWORD_ENV, TOKEN_ENV, generate_after_help, get_log_path, resolve_token,
};
use tripsync::config::{Config, LoggingConfig};
use tripsync::domain::{ProgressSummary, Role, TripRequest};
use tripsync::engine::{EngineOptions, SyncEngine};
use tripsync::remote::{SessionContext, create_api, login};
use tripsync::repl::{ChatSession, render_plan_outline, render_reply};

fn setup_logging(cli_log_level: Option<&str>, config_logging: &LoggingConfig) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = config_logging.file.clone().unwrap_or_else(get_log_path);
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level_str = cli_log_level.or(config_logging.level.as_deref());
    let level = if let Some(s) = level_str {
        debug!(level_str = %s, "setup_logging: level_str is Some");
        match s.to_uppercase().as_str() {
            "TRACE" => {
                debug!("setup_logging: matched TRACE level");
                tracing::Level::TRACE
            }
            "DEBUG" => {
                debug!("setup_logging: matched DEBUG level");
                tracing::Level::DEBUG
            }
            "INFO" => {
                debug!("setup_logging: matched INFO level");
                tracing::Level::INFO
            }
            "WARN" | "WARNING" => {
                debug!("setup_logging: matched WARN level");
                tracing::Level::WARN
            }
            "ERROR" => {
                debug!("setup_logging: matched ERROR level");
                tracing::Level::ERROR
            }
            _ => {
                debug!(level = %s, "setup_logging: unknown level, defaulting to INFO");
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        }
    } else {
        debug!("setup_logging: level_str is None, defaulting to INFO");
        tracing::Level::INFO
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows auth status and log path
    let cmd = Cli::command().after_help(generate_after_help());

    // Parse CLI arguments using the modified command
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Read the logging section early (before the full config load)
    let logging = Config::load_logging(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), &logging).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    info!("TripSync loaded config: base-url={}", config.remote.base_url);

    // Dispatch command
    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Login { username, password }) => {
            debug!(%username, "main: matched Login command");
            cmd_login(&config, &username, password).await
        }
        Some(Command::Chat { conversation, message }) => {
            debug!(?conversation, "main: matched Chat command");
            cmd_chat(&config, cli.token, conversation, message).await
        }
        Some(Command::Conversations { format }) => {
            debug!(?format, "main: matched Conversations command");
            cmd_conversations(&config, cli.token, format).await
        }
        Some(Command::History { conversation }) => {
            debug!(conversation, "main: matched History command");
            cmd_history(&config, cli.token, conversation).await
        }
        Some(Command::Plan {
            destination,
            start,
            end,
            budget,
            travelers,
            requests,
        }) => {
            debug!(%destination, %start, %end, "main: matched Plan command");
            let request = TripRequest {
                destination,
                start_date: start,
                end_date: end,
                budget,
                travelers,
                preferences: requests,
            };
            cmd_plan(&config, cli.token, request).await
        }
        Some(Command::Itineraries { format }) => {
            debug!(?format, "main: matched Itineraries command");
            cmd_itineraries(&config, cli.token, format).await
        }
        Some(Command::Show { itinerary }) => {
            debug!(itinerary, "main: matched Show command");
            cmd_show(&config, cli.token, itinerary).await
        }
        Some(Command::Revise { itinerary, instructions }) => {
            debug!(itinerary, "main: matched Revise command");
            cmd_revise(&config, cli.token, itinerary, instructions).await
        }
        Some(Command::Toggle {
            itinerary,
            day,
            index,
            notes,
        }) => {
            debug!(itinerary, day, index, "main: matched Toggle command");
            cmd_toggle(&config, cli.token, itinerary, day, index, notes).await
        }
        Some(Command::Progress { itinerary }) => {
            debug!(itinerary, "main: matched Progress command");
            cmd_progress(&config, cli.token, itinerary).await
        }
        Some(Command::Notifications { format }) => {
            debug!(?format, "main: matched Notifications command");
            cmd_notifications(&config, cli.token, format).await
        }
        Some(Command::Read { id }) => {
            debug!(id, "main: matched Read command");
            cmd_read(&config, cli.token, id).await
        }
        None => {
            debug!("main: no command provided, showing help");
            Cli::command().after_help(generate_after_help()).print_help()?;
            Ok(())
        }
    }
}

/// Build an authenticated engine handle
fn connect(config: &Config, token: Option<String>) -> Result<SyncEngine> {
    debug!("connect: called");
    let Some(token) = resolve_token(token) else {
        return Err(eyre::eyre!(
            "No access token. Run `tp login <username>` and export {}, or pass --token.",
            TOKEN_ENV
        ));
    };

    let session = SessionContext::new(token);
    let api = create_api(&config.remote, session)?;
    let options = EngineOptions {
        poll_interval: Duration::from_secs(config.polling.notifications_secs),
        polling: config.polling.enabled,
    };
    Ok(SyncEngine::spawn(api, options))
}

/// Log in and print the access token
async fn cmd_login(config: &Config, username: &str, password: Option<String>) -> Result<()> {
    debug!(username, "cmd_login: called");

    let password = match password.or_else(|| std::env::var(PASSWORD_ENV).ok()) {
        Some(p) => p,
        None => {
            return Err(eyre::eyre!("No password. Pass --password or set {}.", PASSWORD_ENV));
        }
    };

    let auth = login(&config.remote.base_url, username, &password).await?;

    println!("Logged in as {} ({})", auth.user.username.bright_green(), auth.user.email);
    println!();
    println!("{}", auth.token);
    println!();
    println!("Export it for later commands:");
    println!("  export {}={}", TOKEN_ENV, auth.token);
    Ok(())
}

/// Chat with the assistant, one-shot or interactive
async fn cmd_chat(config: &Config, token: Option<String>, conversation: Option<i64>, message: Option<String>) -> Result<()> {
    debug!(?conversation, one_shot = message.is_some(), "cmd_chat: called");
    let engine = connect(config, token)?;

    // Resuming: pull the transcript so the session has its context
    if let Some(id) = conversation {
        let turns = engine.load_history(id).await?;
        info!(count = turns.len(), id, "cmd_chat: resumed conversation");
    }

    match message {
        Some(text) => {
            let reply = engine.send_message(text).await?;
            render_reply(&reply);
        }
        None => {
            let mut session = ChatSession::new(engine.clone());
            session.run().await?;

            let snap = engine.snapshot().await?;
            if let Some(id) = snap.conversation_id {
                println!("{}", format!("Resume this conversation with: tp chat --conversation {}", id).dimmed());
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}

/// List conversations
async fn cmd_conversations(config: &Config, token: Option<String>, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_conversations: called");
    let engine = connect(config, token)?;
    let conversations = engine.conversations().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&conversations)?),
        OutputFormat::Text => {
            if conversations.is_empty() {
                println!("No conversations yet. Start one with: tp chat");
            } else {
                for conv in &conversations {
                    let title = conv.title.as_deref().unwrap_or("(untitled)");
                    println!("{:>6}  {}  {}", conv.id, conv.updated_at.format("%Y-%m-%d %H:%M"), title);
                }
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}

/// Show the message history of one conversation
async fn cmd_history(config: &Config, token: Option<String>, conversation: i64) -> Result<()> {
    debug!(conversation, "cmd_history: called");
    let engine = connect(config, token)?;
    let turns = engine.load_history(conversation).await?;

    if turns.is_empty() {
        println!("No messages in conversation {}.", conversation);
    }
    for turn in &turns {
        let role = match turn.role {
            Role::User => "You".bright_green(),
            Role::Assistant => "Assistant".bright_blue(),
        };
        println!(
            "{} {}",
            format!("[{}]", turn.created_at.format("%Y-%m-%d %H:%M")).dimmed(),
            role
        );
        println!("{}", turn.content);
        println!();
    }

    engine.shutdown().await?;
    Ok(())
}

/// Generate a new itinerary and print its outline
async fn cmd_plan(config: &Config, token: Option<String>, request: TripRequest) -> Result<()> {
    debug!(destination = %request.destination, "cmd_plan: called");
    let engine = connect(config, token)?;

    println!("Generating your {} itinerary (this can take a minute)...", request.destination);
    let id = engine.create_itinerary(request).await?;

    let snap = engine.snapshot().await?;
    if let Some(active) = snap.plan {
        println!();
        render_plan_outline(&active.plan);
    }
    println!();
    println!("Saved as itinerary {}.", id.to_string().bright_green());
    println!("Revise it with: tp revise {} \"<instructions>\"", id);

    engine.shutdown().await?;
    Ok(())
}

/// List itineraries
async fn cmd_itineraries(config: &Config, token: Option<String>, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_itineraries: called");
    let engine = connect(config, token)?;
    let itineraries = engine.itineraries().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&itineraries)?),
        OutputFormat::Text => {
            if itineraries.is_empty() {
                println!("No itineraries yet. Create one with: tp plan <destination> --start <date> --end <date>");
            } else {
                for it in &itineraries {
                    println!("{:>6}  {}  {} to {}  {}", it.id, it.destination, it.start_date, it.end_date, it.title);
                }
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}

/// Show one itinerary day by day, with completion marks
async fn cmd_show(config: &Config, token: Option<String>, itinerary: i64) -> Result<()> {
    debug!(itinerary, "cmd_show: called");
    let engine = connect(config, token)?;
    engine.open_itinerary(itinerary).await?;

    let snap = engine.snapshot().await?;
    let Some(active) = snap.plan else {
        return Err(eyre::eyre!("Itinerary {} could not be opened", itinerary));
    };

    println!("{}", active.record.title.bright_cyan().bold());
    println!("{} to {}", active.record.start_date, active.record.end_date);
    if let Some(budget) = active.record.budget {
        println!("Budget: {:.2}", budget);
    }
    println!();

    for day in &active.plan.days {
        let theme = if day.theme.is_empty() {
            String::new()
        } else {
            format!(" - {}", day.theme)
        };
        println!("{} {}{}", format!("Day {}", day.day).bright_green(), day.date, theme);
        for (i, activity) in day.activities.iter().enumerate() {
            let done = snap.progress.as_ref().is_some_and(|p| {
                p.entries
                    .iter()
                    .any(|e| e.day == day.day && e.activity_index == i as u32 && e.completed)
            });
            let mark = if done {
                "[x]".bright_green().to_string()
            } else {
                "[ ]".to_string()
            };
            let cost = if activity.cost > 0.0 {
                format!("  ({:.2})", activity.cost)
            } else {
                String::new()
            };
            println!("  {} {} {} {}{}", mark, i, activity.time.dimmed(), activity.activity, cost.dimmed());
        }
    }

    if let Some(progress) = &snap.progress {
        println!();
        println!(
            "Progress: {}/{} activities ({}%)",
            progress.completed_activities, progress.total_activities, progress.completion_percentage
        );
    }

    engine.shutdown().await?;
    Ok(())
}

/// Revise an itinerary and print the new outline
async fn cmd_revise(config: &Config, token: Option<String>, itinerary: i64, instructions: String) -> Result<()> {
    debug!(itinerary, "cmd_revise: called");
    let engine = connect(config, token)?;
    engine.open_itinerary(itinerary).await?;

    println!("Revising itinerary {} (this can take a minute)...", itinerary);
    let message = engine.revise_itinerary(instructions).await?;

    println!();
    println!("{}", message);
    let snap = engine.snapshot().await?;
    if let Some(active) = snap.plan {
        println!();
        render_plan_outline(&active.plan);
    }

    engine.shutdown().await?;
    Ok(())
}

/// Toggle an activity's completion mark
async fn cmd_toggle(
    config: &Config,
    token: Option<String>,
    itinerary: i64,
    day: u32,
    index: u32,
    notes: Option<String>,
) -> Result<()> {
    debug!(itinerary, day, index, "cmd_toggle: called");
    let engine = connect(config, token)?;
    engine.open_itinerary(itinerary).await?;

    let summary = engine.toggle_activity(day, index, notes).await?;
    print_progress(&summary);

    engine.shutdown().await?;
    Ok(())
}

/// Show activity completion progress
async fn cmd_progress(config: &Config, token: Option<String>, itinerary: i64) -> Result<()> {
    debug!(itinerary, "cmd_progress: called");
    let engine = connect(config, token)?;
    engine.open_itinerary(itinerary).await?;

    let snap = engine.snapshot().await?;
    match snap.progress {
        Some(summary) => print_progress(&summary),
        // The prefetch failed; ask again explicitly
        None => print_progress(&engine.refresh_progress().await?),
    }

    engine.shutdown().await?;
    Ok(())
}

/// Print a progress summary with its completed marks
fn print_progress(summary: &ProgressSummary) {
    println!(
        "Progress: {}/{} activities ({}%)",
        summary.completed_activities, summary.total_activities, summary.completion_percentage
    );
    for entry in &summary.entries {
        if entry.completed {
            let notes = entry.notes.as_deref().unwrap_or("");
            println!(
                "  {} day {} activity {}  {}",
                "[x]".bright_green(),
                entry.day,
                entry.activity_index,
                notes.dimmed()
            );
        }
    }
}

/// List notifications
async fn cmd_notifications(config: &Config, token: Option<String>, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_notifications: called");
    let engine = connect(config, token)?;
    let notifications = engine.notifications().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&notifications)?),
        OutputFormat::Text => {
            if notifications.is_empty() {
                println!("No notifications.");
            } else {
                for n in &notifications {
                    let marker = if n.is_unread() {
                        "*".bright_yellow().to_string()
                    } else {
                        " ".to_string()
                    };
                    println!("{} {:>6}  [{}]  {}", marker, n.id, n.kind, n.title);
                    if !n.message.is_empty() {
                        println!("          {}", n.message.dimmed());
                    }
                }
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}

/// Mark a notification as read
async fn cmd_read(config: &Config, token: Option<String>, id: i64) -> Result<()> {
    debug!(id, "cmd_read: called");
    let engine = connect(config, token)?;
    engine.mark_notification_read(id).await?;

    let snap = engine.snapshot().await?;
    match snap.unread {
        Some(count) => println!("Marked {} read. {} unread remaining.", id, count),
        None => println!("Marked {} read.", id),
    }

    engine.shutdown().await?;
    Ok(())
}
