//! Vitrina Bot - chat-driven showcase inventory service
//!
//! Wires the full stack together behind a console chat adapter:
//! SQLite ledger, transaction engine, two-party confirmation workflow,
//! per-chat conversation pipelines, localization and audit logging.
//!
//! # Quick Start
//!
//! ```bash
//! # First admin registers from chat id 100
//! vitrina-bot --admin-ids 100 --vitrine-password sesame
//!
//! # Then talk to it on stdin, one line per message:
//! #   <chat_id>[:<username>] <text>
//! 100:boss /start
//! ```

mod console;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitrina_delivery::Delivery;
use vitrina_audit::FileAuditSink;
use vitrina_confirm::ConfirmationWorkflow;
use vitrina_engine::Engine;
use vitrina_flow::{Action, FlowConfig, FlowController};
use vitrina_i18n::Localizer;
use vitrina_reports::Reports;
use vitrina_store::Store;
use vitrina_types::{ChatId, Language};

use console::ConsoleChat;

/// Vitrina Bot - showcase inventory over chat
#[derive(Parser, Debug)]
#[command(
    name = "vitrina-bot",
    about = "Chat-driven inventory tracking for product showcases",
    version
)]
struct Args {
    /// SQLite database URL
    #[arg(long, default_value = "sqlite://vitrina.db", env = "VITRINA_DATABASE_URL")]
    database_url: String,

    /// Chat ids that register and act as administrators (comma-separated)
    #[arg(long, env = "VITRINA_ADMIN_IDS", value_delimiter = ',', required = true)]
    admin_ids: Vec<i64>,

    /// Password gating vitrine self-registration
    #[arg(long, env = "VITRINA_PASSWORD", required = true)]
    vitrine_password: String,

    /// Fallback interface language: ru, uz or en
    #[arg(long, default_value = "uz", env = "VITRINA_LANGUAGE")]
    default_language: String,

    /// Directory for audit log files
    #[arg(long, default_value = "logs", env = "VITRINA_AUDIT_DIR")]
    audit_dir: std::path::PathBuf,

    /// Seed the demo product catalog on an empty database
    #[arg(long, default_value = "false")]
    seed_products: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let default_language = Language::from_code(&args.default_language)
        .with_context(|| format!("unknown language code: {}", args.default_language))?;
    let admin_chat_ids: Vec<ChatId> = args.admin_ids.iter().copied().map(ChatId).collect();

    let store = Store::connect(&args.database_url)
        .await
        .with_context(|| format!("opening {}", args.database_url))?;
    store.init_schema().await.context("initializing schema")?;
    if args.seed_products {
        store.seed_products().await.context("seeding products")?;
    }
    let created = store
        .ensure_admins(&admin_chat_ids, default_language)
        .await
        .context("registering admins")?;
    if created > 0 {
        tracing::info!(created, "pre-registered admin accounts");
    }

    let localizer = Arc::new(Localizer::new(default_language).context("loading locales")?);
    let delivery = Arc::new(ConsoleChat::new());
    let audit = Arc::new(
        FileAuditSink::new(&args.audit_dir)
            .await
            .with_context(|| format!("opening audit dir {}", args.audit_dir.display()))?,
    );

    let engine = Engine::new(store.clone());
    let confirm = ConfirmationWorkflow::new(
        store.clone(),
        engine.clone(),
        localizer.clone(),
        delivery.clone(),
        audit.clone(),
    );
    let reports = Reports::new(store.clone());
    let flow = FlowController::new(
        store,
        engine,
        confirm,
        reports,
        localizer,
        delivery.clone(),
        audit,
        FlowConfig {
            admin_chat_ids,
            vitrine_password: args.vitrine_password,
        },
    );

    tracing::info!("vitrina-bot ready, reading messages from stdin");
    run(flow, delivery).await
}

/// Read inbound lines from stdin and dispatch them one at a time.
/// Replies go back out through the same console adapter.
async fn run(flow: FlowController, chat: Arc<ConsoleChat>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let Some(inbound) = console::parse_line(&line) else {
            continue;
        };

        let action = decode(&chat, inbound.chat_id, &inbound.text);
        let replies = flow.handle(inbound.chat_id, &inbound.username, action).await;
        for reply in replies {
            chat.send(inbound.chat_id, reply).await;
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

fn decode(chat: &ConsoleChat, chat_id: ChatId, text: &str) -> Action {
    if text == "/start" {
        return Action::Start;
    }
    match chat.action_for(chat_id, text) {
        Some(action) => Action::Button(action),
        None => Action::Text(text.to_string()),
    }
}
