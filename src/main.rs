//! ELI5 command-line explainer
//!
//! Entry point: loads configuration, runs one explanation request and prints
//! the result.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use eli5_stream::config::{AppConfig, Cli};
use eli5_stream::llm::{HttpTransport, mask_key};
use eli5_stream::markup;
use eli5_stream::{
    ControllerSettings, ElementId, RequestController, RequestOutcome, SessionState, View,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Renders controller updates to the terminal.
///
/// Loading messages and progress go to stderr; the final explanation is
/// printed to stdout by `main`. The title is held back until the results are
/// shown.
#[derive(Debug, Default)]
struct TerminalView {
    title: Mutex<Option<String>>,
}

impl View for TerminalView {
    fn set_text(&self, id: ElementId, text: &str) {
        match id {
            ElementId::LoadingMessage => eprintln!("{text}"),
            ElementId::ResultTitle => {
                *self.title.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
            }
            ElementId::Error => eprintln!("error: {text}"),
            _ => {}
        }
    }

    fn set_html(&self, id: ElementId, html: &str) {
        if id == ElementId::ResultContent {
            let chars = markup::plain_text(html).chars().count();
            eprint!("\r{chars} characters received");
            let _ = std::io::stderr().flush();
        }
    }

    fn show(&self, id: ElementId) {
        if id == ElementId::Results {
            let title = self.title.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(title) = title {
                eprintln!("== {title} ==");
            }
        }
    }

    fn hide(&self, id: ElementId) {
        if id == ElementId::Loading {
            eprintln!();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();

    // Initialize tracing (M-LOG-STRUCTURED)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    let config = AppConfig::from_cli(&cli).context("Configuration error")?;

    info!(
        name: "config.loaded",
        api_url = %config.api.url,
        model = %config.api.model,
        has_api_key = config.api.key.is_some(),
        api_key = %config.api.key.as_deref().map(mask_key).unwrap_or_default(),
        environment = %config.app.environment,
        version = %config.app.version,
        "Configuration loaded"
    );

    let topic = cli.topic.join(" ");
    let controller = RequestController::new(
        SessionState::new(config.session_config()),
        Arc::new(HttpTransport::with_connect_timeout(CONNECT_TIMEOUT)),
        Arc::new(TerminalView::default()),
        ControllerSettings::from(&config),
    );

    match controller.submit(&topic, cli.complexity).await {
        RequestOutcome::Success(text) => {
            let html = markup::format(&text);
            if cli.plain {
                println!("{}", markup::plain_text(&html));
            } else {
                println!("{html}");
            }
            Ok(())
        }
        RequestOutcome::Failure { kind, message } => {
            anyhow::bail!("{message} ({kind:?})")
        }
        RequestOutcome::Superseded => anyhow::bail!("request was superseded"),
    }
}
