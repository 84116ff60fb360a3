use std::sync::Arc;

use clap::Parser;
use ui::DriverKind;

const DEFAULT_QUESTION: &str =
    "What is the total overtime pay for the Alcohol Beverage Services department?";

/// Ask one question about the 2023 salary dataset and print the answer.
#[derive(Debug, Parser)]
#[command(name = "salary-agent", version)]
struct Args {
    /// The question to ask.
    #[arg(default_value = DEFAULT_QUESTION)]
    question: String,

    /// Use the assistant-run API and poll for the answer.
    #[arg(long)]
    assistant: bool,

    /// Reuse the existing database file instead of reloading the CSV.
    #[arg(long)]
    skip_ingest: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    ui::init_tracing();

    let conf = config::AgentConfig::load()?;
    let db = Arc::new(ui::open_store(&conf.data, args.skip_ingest).await?);

    let kind = if args.assistant {
        DriverKind::Assistant
    } else {
        DriverKind::Chat
    };
    let mut session = ui::start_session(&conf, db.clone(), kind).await?;

    let answer = session.ask(&args.question).await;
    db.close().await;

    println!("{}", answer?);
    Ok(())
}
