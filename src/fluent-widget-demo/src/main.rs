//! Fluent widget demo — drives a headless widget session from the command line.
//!
//! Loads a declarative widget configuration, initializes the widget against an
//! in-memory page with file-backed visitor storage, sends the given messages,
//! and prints the resulting transcript as JSON.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fluent_core::event_bus::WidgetHooks;
use fluent_core::types::MessageAuthor;
use fluent_core::{PartialWidgetConfig, RuntimeSettings};
use fluent_widget::{
    CannedResponder, ChatWidgetMounter, FileStorage, FluentWidget, MemoryPage, ReplyDelay,
    WidgetEnvironment,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fluent-widget-demo")]
#[command(about = "Run a headless Fluent chat widget session")]
#[command(version)]
struct Cli {
    /// Declarative widget configuration (JSON, camelCase fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// API key (overrides the configuration file)
    #[arg(long, env = "FLUENT_WIDGET_API_KEY")]
    api_key: Option<String>,

    /// Runtime settings file (TOML or JSON)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Message to send; repeat for a conversation
    #[arg(long = "message", short = 'm')]
    messages: Vec<String>,

    /// Initialize through the declarative auto-init path
    #[arg(long, default_value_t = false)]
    auto_init: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptLine {
    author: MessageAuthor,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Transcript {
    version: &'static str,
    visitor_id: Option<String>,
    conversation_id: Option<String>,
    messages: Vec<TranscriptLine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = RuntimeSettings::load(cli.settings.as_deref());
    let json_logs = loaded.as_ref().map(|s| s.json_logs).unwrap_or(false);
    init_tracing(json_logs);

    let settings = loaded.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load settings, using defaults");
        RuntimeSettings::default()
    });

    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading widget config {}", path.display()))?;
            PartialWidgetConfig::from_json(&raw)?
        }
        None => PartialWidgetConfig::default(),
    };
    if let Some(key) = cli.api_key {
        config.api_key = Some(key);
    }

    let transcript = Arc::new(Mutex::new(Vec::new()));
    let sink = transcript.clone();
    let hooks = WidgetHooks::new()
        .on_ready(|| info!("Widget ready"))
        .on_message(move |content, author, _| {
            if let Ok(mut lines) = sink.lock() {
                lines.push(TranscriptLine {
                    author,
                    content: content.to_string(),
                });
            }
        })
        .on_conversation_start(|id| info!(conversation_id = %id, "Conversation started"))
        .on_error(|e| warn!(code = %e.code, message = %e.message, "Widget reported an error"))
        .into_sink();
    let config = config.hooks(hooks);

    info!(
        storage = %settings.storage_path,
        reply_delay_min_ms = settings.reply_delay_min_ms,
        reply_delay_max_ms = settings.reply_delay_max_ms,
        "Settings loaded"
    );

    let mounter = ChatWidgetMounter::new(Arc::new(CannedResponder::new())).with_reply_delay(
        ReplyDelay::between(settings.reply_delay_min_ms, settings.reply_delay_max_ms),
    );
    let widget = Arc::new(FluentWidget::new(WidgetEnvironment::new(
        Arc::new(MemoryPage::new()),
        Arc::new(FileStorage::new(&settings.storage_path)),
        Arc::new(mounter),
    )));

    if cli.auto_init {
        let delay = Duration::from_millis(settings.auto_init_delay_ms);
        widget.arm_auto_init(Some(config), delay);
        tokio::time::sleep(delay + Duration::from_millis(50)).await;
        if widget.instance().is_none() {
            anyhow::bail!("auto-initialization did not produce a widget");
        }
    } else {
        widget.init(config)?;
    }

    let reply_wait = Duration::from_millis(settings.reply_delay_max_ms + 50);
    for text in &cli.messages {
        let result = widget.send_message(text, Vec::new()).await?;
        if !result.success {
            warn!(message = %text, error = ?result.error, "Message rejected");
            continue;
        }
        tokio::time::sleep(reply_wait).await;
    }

    let output = Transcript {
        version: widget.version(),
        visitor_id: widget.visitor_id(),
        conversation_id: widget.conversation_id(),
        messages: transcript
            .lock()
            .map(|mut lines| std::mem::take(&mut *lines))
            .unwrap_or_default(),
    };
    widget.destroy();

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fluent_widget=info,fluent_core=info,fluent_widget_demo=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
