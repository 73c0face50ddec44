//! Interactive chat session

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::AssistantReply;
use crate::domain::{Delivery, ItineraryPlan, Role};
use crate::engine::{EngineError, SyncEngine};

/// Interactive chat session against the travel assistant
pub struct ChatSession {
    engine: SyncEngine,
}

impl ChatSession {
    /// Create a new chat session
    pub fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    /// Run the chat main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        // Create readline editor for proper line editing
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        // Main loop
        loop {
            // Read user input with readline (handles backspace, arrows, etc.)
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    // Add to history
                    let _ = rl.add_history_entry(input);

                    // Handle slash commands
                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await? {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_message(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Print welcome message
    fn print_welcome(&self) {
        println!();
        println!("{}", "TripSync Travel Assistant".bright_cyan().bold());
        println!("Ask for a trip plan, or anything about your itinerary.");
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// Handle slash commands
    async fn handle_slash_command(&mut self, input: &str) -> Result<SlashResult> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/help" | "/h" => {
                self.print_help();
                Ok(SlashResult::Continue)
            }
            "/quit" | "/q" | "/exit" => Ok(SlashResult::Quit),
            "/history" => {
                self.print_history().await?;
                Ok(SlashResult::Continue)
            }
            "/unread" => {
                match self.engine.unread_count().await {
                    Ok(0) => println!("{}", "No unread notifications.".dimmed()),
                    Ok(count) => println!("{} unread notification(s). See them with: tp notifications", count),
                    Err(err) => println!("{} {}", "Error:".red(), err),
                }
                Ok(SlashResult::Continue)
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                Ok(SlashResult::Continue)
            }
        }
    }

    /// Print help message
    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the chat", "/quit".yellow());
        println!("  {:14} Show the transcript so far", "/history".yellow());
        println!("  {:14} Show the unread notification count", "/unread".yellow());
        println!();
    }

    /// Print the transcript so far
    async fn print_history(&self) -> Result<()> {
        let snap = self.engine.snapshot().await?;
        if snap.turns.is_empty() {
            println!("{}", "No messages yet.".dimmed());
            return Ok(());
        }

        println!();
        match snap.conversation_id {
            Some(id) => println!("{}", format!("Conversation {}:", id).bright_cyan()),
            None => println!("{}", "Conversation (not yet saved):".bright_cyan()),
        }
        for (i, turn) in snap.turns.iter().enumerate() {
            let role = match turn.role {
                Role::User => "You".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
            };
            let marker = if turn.delivery == Delivery::Pending { " (sending)" } else { "" };
            let preview: String = turn.content.chars().take(60).collect();
            let preview = if turn.content.chars().count() > 60 {
                format!("{}...", preview)
            } else {
                preview
            };
            println!("  {}. {}{}: {}", i + 1, role, marker.dimmed(), preview);
        }
        println!();
        Ok(())
    }

    /// Send one message and render the reply
    ///
    /// Delivery failures are printed, not propagated; the engine has already
    /// rolled the message back and the session goes on.
    async fn process_message(&mut self, input: &str) {
        match self.engine.send_message(input).await {
            Ok(reply) => render_reply(&reply),
            Err(err) => {
                println!("{} {}", "Error:".red(), err);
                if let EngineError::Remote(remote) = &err
                    && let Some(wait) = remote.retry_after()
                {
                    println!("{}", format!("Rate limited; try again in {}s.", wait.as_secs()).yellow());
                } else if err.is_retryable() {
                    println!("{}", "This looks transient; sending it again may work.".yellow());
                }
                println!("{}", "Your message was not delivered and has been removed from the transcript.".dimmed());
            }
        }
        println!();
    }
}

/// Render a classified assistant reply
pub fn render_reply(reply: &AssistantReply) {
    match reply {
        AssistantReply::Text(text) => println!("{}", text),
        AssistantReply::Rejected(text) => {
            println!("{}", text);
            println!("{}", "The assistant only handles travel questions.".yellow());
        }
        AssistantReply::Structured { message, plan } => {
            println!("{}", message);
            println!();
            render_plan_outline(plan);
        }
    }
}

/// Render a day-by-day outline of a plan
pub fn render_plan_outline(plan: &ItineraryPlan) {
    if !plan.destination.is_empty() {
        println!("{}", plan.destination.bright_cyan().bold());
    }
    for day in &plan.days {
        let theme = if day.theme.is_empty() {
            String::new()
        } else {
            format!(" - {}", day.theme)
        };
        println!("  {} {}{}", format!("Day {}", day.day).bright_green(), day.date, theme.dimmed());
        for (i, activity) in day.activities.iter().enumerate() {
            println!("    {}. {} {}", i, activity.time.dimmed(), activity.activity);
        }
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}
