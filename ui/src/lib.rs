//! Startup shared by the interactive and one-shot binaries.

pub mod preview;

use std::sync::Arc;

use ai::{AssistantSpec, Conversation, OpenAiClient, PollPolicy, RunDriver, Session};
use anyhow::Context;
use config::{AgentConfig, DataConfig};
use db::Database;
use db::ingest::load_csv;
use db::sqlite::SqliteDatabase;
use tools::{Catalog, Dispatcher};
use tracing_subscriber::EnvFilter;

pub const SYSTEM_PROMPT: &str = "You answer questions about the 2023 employee salary dataset. \
Use the provided functions to look figures up instead of guessing, and say so when a function \
returns no data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Chat completions with a single tool round.
    Chat,
    /// Assistant runs, polled until they finish.
    Assistant,
}

/// Logs go to stderr so they never interleave with answers.
/// `RUST_LOG` overrides the `warn` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the CSV into the database, unless `skip_ingest`, then opens it read-only.
pub async fn open_store(data: &DataConfig, skip_ingest: bool) -> anyhow::Result<SqliteDatabase> {
    if !skip_ingest {
        let report = load_csv(&data.csv_path, &data.database_path)
            .await
            .with_context(|| format!("could not load {}", data.csv_path.display()))?;
        tracing::info!(
            table = %report.table,
            rows = report.rows,
            columns = report.columns,
            "salary data loaded"
        );
    }

    SqliteDatabase::open(&data.database_path)
        .await
        .with_context(|| format!("could not open {}", data.database_path.display()))
}

/// Wires the model client and the salary tools into the requested driver.
pub async fn start_session(
    conf: &AgentConfig,
    db: Arc<dyn Database>,
    kind: DriverKind,
) -> anyhow::Result<Session> {
    let client = Arc::new(OpenAiClient::from_config(&conf.ai));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(Catalog::salary()), db));

    match kind {
        DriverKind::Chat => {
            let mut conversation = Conversation::new(client, dispatcher);
            conversation.set_system_prompt(SYSTEM_PROMPT);
            Ok(Session::Chat(conversation))
        }
        DriverKind::Assistant => {
            let spec = AssistantSpec {
                name: "Salary Assistant".to_string(),
                description: "Assistant to help with salary data".to_string(),
                instructions: Some(SYSTEM_PROMPT.to_string()),
            };
            let driver =
                RunDriver::create(client, dispatcher, &spec, PollPolicy::from(&conf.polling))
                    .await
                    .context("could not register the assistant")?;
            Ok(Session::Assistant(driver))
        }
    }
}
