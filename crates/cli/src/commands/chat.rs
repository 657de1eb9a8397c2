//! `murmur chat` — interactive chat with a background ticker.
//!
//! The REPL thread handles incoming lines; a spawned ticker drives the
//! scheduler at the configured check interval so deferred tasks fire while
//! the user is quiet. Background answers are printed by `PrintSink` as they
//! arrive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use murmur_config::AppConfig;
use murmur_core::error::NotifyError;
use murmur_core::message::OwnerId;
use murmur_core::response::ControllerResponse;
use murmur_core::NotificationSink;
use murmur_history::InMemoryStore;
use murmur_runtime::{Assistant, HandleOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// Prints background-task answers to the terminal.
struct PrintSink;

#[async_trait]
impl NotificationSink for PrintSink {
    async fn notify(
        &self,
        _owner: &OwnerId,
        response: &ControllerResponse,
    ) -> Result<(), NotifyError> {
        println!();
        println!("🔔 {}", response.answer);
        if !response.attachments.is_empty() {
            println!("   ({} attachment(s) included)", response.attachments.len());
        }
        print_prompt();
        Ok(())
    }
}

fn print_prompt() {
    use std::io::Write;
    print!("you> ");
    let _ = std::io::stdout().flush();
}

pub async fn run(message: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    // Everything but a local Ollama needs a key — fail with instructions,
    // not an opaque 401 later.
    if !config.has_api_key() && config.model.provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    MURMUR_API_KEY      (generic)");
        eprintln!("    OPENROUTER_API_KEY  (for OpenRouter)");
        eprintln!("    OPENAI_API_KEY      (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    }

    let model = murmur_providers::from_config(&config.model)?;
    let tools = Arc::new(murmur_tools::builtin_registry()?);
    let store = Arc::new(InMemoryStore::new());

    let assistant = Arc::new(Assistant::new(
        &config,
        model,
        tools,
        store,
        Arc::new(PrintSink),
    ));
    assistant.load_routines(&config.routines).await;

    let owner = OwnerId::new("cli:local");

    // The scheduler's timer: one tick per check interval.
    let ticker = tokio::spawn({
        let assistant = assistant.clone();
        let check_interval = Duration::from_secs(config.scheduler.task_check_interval_secs);
        async move {
            let mut interval = tokio::time::interval(check_interval);
            loop {
                interval.tick().await;
                assistant.tick().await;
            }
        }
    });

    // Single-message mode
    if let Some(text) = message {
        respond(&assistant, &owner, &text).await;
        ticker.abort();
        return Ok(());
    }

    info!(model = %config.model.model, "Interactive chat started");
    println!("murmur — type a message, or 'exit' to quit.");
    print_prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            print_prompt();
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        respond(&assistant, &owner, line).await;
        print_prompt();
    }

    ticker.abort();
    Ok(())
}

async fn respond(assistant: &Assistant, owner: &OwnerId, text: &str) {
    match assistant.handle_message(owner, text).await {
        Ok(HandleOutcome::Replied(response)) => {
            println!("{}", response.answer);
            if !response.tool_calls.is_empty() {
                info!(tool_calls = response.tool_calls.len(), "Reply used tools");
            }
        }
        Ok(HandleOutcome::Deferred { acknowledgment }) => {
            println!("{acknowledgment}");
        }
        Err(e) => {
            // Model failures and blown deadlines land here; the user always
            // gets a clearly worded failure instead of silence.
            println!("Sorry — I couldn't finish that: {e}");
        }
    }
}
