//! clockrep CLI - Monthly Clockify workbooks
//!
//! Serves the report over HTTP, emails it on a schedule, or produces it once.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clockrep_core::{DateSelector, MonthKey};
use clockrep_pipeline::ReportPipeline;
use clockrep_server::config::{AccessArgs, BindArgs, ClockifyArgs, MailArgs};
use clockrep_server::{
    parse_schedule, router, send_last_month, shutdown, AppState, ReportMailer, ReportScheduler,
    SmtpMailer,
};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "clockrep")]
#[command(author, version, about = "Monthly Clockify time-tracking workbooks", long_about = None)]
struct Cli {
    /// Verbose output (-v debug, -vv trace) when RUST_LOG is unset
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    clockify: ClockifyArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service and the email scheduler
    Serve {
        #[command(flatten)]
        bind: BindArgs,

        #[command(flatten)]
        access: AccessArgs,

        #[command(flatten)]
        mail: MailArgs,
    },

    /// Write one workbook to disk
    Generate {
        /// Month, 1-12 (defaults to the current month)
        #[arg(long, requires = "year", conflicts_with = "last")]
        month: Option<u32>,

        #[arg(long, requires = "month")]
        year: Option<i32>,

        /// Previous calendar month
        #[arg(long)]
        last: bool,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Email last month's workbook once
    Send {
        #[command(flatten)]
        mail: MailArgs,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let pipeline = Arc::new(cli.clockify.pipeline()?);

    match cli.command {
        Commands::Serve { bind, access, mail } => serve(pipeline, bind, access, mail).await,
        Commands::Generate {
            month,
            year,
            last,
            output,
        } => {
            let selector = match (month, year, last) {
                (_, _, true) => DateSelector::Last,
                (Some(month), Some(year), false) => {
                    DateSelector::Month(MonthKey::from_display(year, month)?)
                }
                _ => DateSelector::Current,
            };
            generate(&pipeline, selector, &output).await
        }
        Commands::Send { mail } => {
            let mailer = SmtpMailer::new(mail.settings()).context("invalid mail configuration")?;
            let month = send_last_month(&pipeline, &mailer)
                .await
                .context("sending last month's report failed")?;
            println!("Sent report for {month}");
            Ok(())
        }
    }
}

async fn generate(
    pipeline: &ReportPipeline,
    selector: DateSelector,
    output: &Path,
) -> Result<()> {
    let report = pipeline
        .generate(selector)
        .await
        .context("report generation failed")?;
    std::fs::write(output, &report.artifact)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Wrote {} ({} bytes, {})",
        output.display(),
        report.artifact.len(),
        report.month
    );
    Ok(())
}

async fn serve(
    pipeline: Arc<ReportPipeline>,
    bind: BindArgs,
    access: AccessArgs,
    mail: MailArgs,
) -> Result<()> {
    let schedule = parse_schedule(&mail.email_schedule)
        .with_context(|| format!("invalid EMAIL_SCHEDULE {:?}", mail.email_schedule))?;
    let mailer: Arc<dyn ReportMailer> =
        Arc::new(SmtpMailer::new(mail.settings()).context("invalid mail configuration")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(shutdown::forward_signal(tokio::signal::ctrl_c(), shutdown_tx));

    let scheduler = ReportScheduler::new(schedule, pipeline.clone(), mailer.clone());
    let scheduler_task = tokio::spawn(scheduler.run(shutdown::requested(shutdown_rx.clone())));

    let app = router(AppState { pipeline, mailer }, access.basic_auth());
    let listener = tokio::net::TcpListener::bind(bind.bind)
        .await
        .context("failed to bind TCP listener")?;
    let addr = listener
        .local_addr()
        .context("failed to read socket address")?;
    info!(%addr, "clockrep listening");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::requested(shutdown_rx))
        .await
    {
        error!(?err, "HTTP server terminated with error");
    }

    scheduler_task.await.context("scheduler task panicked")?;
    Ok(())
}
