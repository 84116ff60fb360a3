use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use db::Database;
use inquire::InquireError;
use ui::DriverKind;

/// Chat with the 2023 salary dataset.
#[derive(Debug, Parser)]
#[command(name = "salary-chat", version)]
struct Args {
    /// Use the assistant-run API and poll for answers.
    #[arg(long)]
    assistant: bool,

    /// Reuse the existing database file instead of reloading the CSV.
    #[arg(long)]
    skip_ingest: bool,

    /// Rows shown in the dataset preview.
    #[arg(long, default_value_t = 5)]
    preview_rows: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    ui::init_tracing();

    let conf = config::AgentConfig::load()?;

    cliclack::intro("salary chat".bold())?;

    let spinner = cliclack::spinner();
    spinner.start("Loading salary data...");
    let db = match ui::open_store(&conf.data, args.skip_ingest).await {
        Ok(db) => {
            spinner.stop("Salary data ready");
            Arc::new(db)
        }
        Err(err) => {
            spinner.error(&err);
            return Err(err);
        }
    };

    let records = db
        .preview(args.preview_rows)
        .await
        .context("could not read the dataset preview")?;
    println!("{}", ui::preview::table(&records));

    let kind = if args.assistant {
        DriverKind::Assistant
    } else {
        DriverKind::Chat
    };
    let mut session = ui::start_session(&conf, db.clone(), kind).await?;

    cliclack::log::info("Ask a question about the salaries, or type `exit` to quit.")?;

    loop {
        let prompt = match inquire::Text::new("You:").prompt() {
            Ok(prompt) => prompt,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };

        let question = prompt.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match session.ask(question).await {
            Ok(answer) => println!("\n{} {}\n", "[Assistant]".blue(), answer.blue()),
            Err(err) => eprintln!("{} {err}", "error:".red()),
        }
    }

    db.close().await;
    cliclack::outro("Goodbye!")?;

    Ok(())
}
