use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use libris_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "libris", version, about = "Library circulation service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Assess overdue fines and send due-soon/overdue notices
    Sweep {
        /// Day to evaluate against, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load libris settings")?;
    libris_telemetry::init(&settings.telemetry);

    match cli.command {
        Command::Serve => libris_app::serve(&settings).await,
        Command::Migrate => {
            let applied = libris_app::migrate(&settings).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::Sweep { date } => {
            let report = libris_app::sweep(&settings, date).await?;
            println!(
                "fines created: {}, due-soon notices: {}, overdue notices: {}",
                report.fines_created, report.due_soon_notices, report.overdue_notices
            );
            Ok(())
        }
    }
}
