use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod buckets;
mod config;
mod coordinator;
mod db;
mod error;
mod models;
mod report;
mod store;

use config::Settings;
use models::AttendanceSubmission;
use report::{AttendanceStatus, ReportOptions};
use store::{AttendanceStore, InMemoryStore};

#[derive(Parser)]
#[command(name = "attendance-insights")]
#[command(about = "Batch attendance aggregation and reporting", long_about = None)]
struct Cli {
    /// Run against a built-in sample roster instead of Postgres
    #[arg(long, global = true)]
    demo: bool,

    /// Override the day treated as "today" (YYYY-MM-DD)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample students, faculty and ten days of marks
    Seed,
    /// Import student marks from a CSV file (enrollment_no,date,present)
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List batch labels
    Batches,
    /// Record student attendance for one day
    Mark {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_delimiter = ',')]
        present: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        absent: Vec<String>,
    },
    /// Record faculty attendance for one day
    MarkFaculty {
        #[arg(long)]
        email: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        absent: bool,
    },
    /// Summarize one student or faculty member
    #[command(group(
        ArgGroup::new("subject")
            .args(["enrollment", "faculty_email"])
            .required(true)
            .multiple(false)
    ))]
    Summary {
        #[arg(long)]
        enrollment: Option<String>,
        #[arg(long)]
        faculty_email: Option<String>,
    },
    /// Student dashboard: overall percentage plus today's mark
    Dashboard {
        #[arg(long)]
        enrollment: String,
    },
    /// Attendance trend for a batch
    Trend {
        #[arg(long)]
        batch: String,
        /// weekly or daily
        #[arg(long, default_value = "weekly")]
        mode: String,
        /// Window length for daily mode
        #[arg(long)]
        days: Option<u32>,
    },
    /// Per-student overview for a batch
    Overview {
        #[arg(long)]
        batch: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Every mark recorded for a batch, newest day first
    ClassHistory {
        #[arg(long)]
        batch: String,
        /// Only list marks from this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Students with no present mark today
    AbsentToday {
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Full markdown report for a batch
    Report {
        #[arg(long)]
        batch: String,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_insights=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn emit(output: &str, out: Option<&PathBuf>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Written to {}.", path.display());
        }
        None => print!("{output}"),
    }
    Ok(())
}

async fn open_store(
    demo: bool,
    settings: &Settings,
    today: NaiveDate,
) -> anyhow::Result<Box<dyn AttendanceStore>> {
    if demo {
        tracing::info!(%today, "using in-memory sample store");
        return Ok(Box::new(InMemoryStore::with_sample_data(today)));
    }
    let pool = db::connect(settings.require_database_url()?, settings.max_connections)
        .await
        .context("failed to connect to Postgres")?;
    Ok(Box::new(db::PgAttendanceStore::new(pool)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let today = cli.today.unwrap_or_else(|| Utc::now().date_naive());

    match cli.command {
        Commands::InitDb | Commands::Seed if cli.demo => {
            anyhow::bail!("init-db and seed need Postgres; drop --demo");
        }
        Commands::InitDb => {
            let pool = db::connect(settings.require_database_url()?, settings.max_connections)
                .await
                .context("failed to connect to Postgres")?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = db::connect(settings.require_database_url()?, settings.max_connections)
                .await
                .context("failed to connect to Postgres")?;
            let written = db::seed(&pool, today).await?;
            println!("Seed data inserted ({written} attendance marks).");
        }
        command => {
            let store = open_store(cli.demo, &settings, today).await?;
            run(command, store.as_ref(), &settings, today).await?;
        }
    }

    Ok(())
}

async fn run(
    command: Commands,
    store: &dyn AttendanceStore,
    settings: &Settings,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let options = ReportOptions::from_settings(settings, today);

    match command {
        Commands::InitDb | Commands::Seed => {
            anyhow::bail!("schema commands run before a store is opened");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(store, &csv).await?;
            println!("Recorded {inserted} marks from {}.", csv.display());
        }
        Commands::Batches => {
            let batches = store.list_batches().await?;
            if batches.is_empty() {
                println!("No batches found.");
            }
            for batch in batches {
                println!("{batch}");
            }
        }
        Commands::Mark {
            date,
            present,
            absent,
        } => {
            let date = date.unwrap_or(today);
            let submissions: Vec<AttendanceSubmission> = present
                .iter()
                .map(|id| AttendanceSubmission::new(id.trim(), date, true))
                .chain(absent.iter().map(|id| AttendanceSubmission::new(id.trim(), date, false)))
                .collect();
            if submissions.is_empty() {
                anyhow::bail!("pass at least one --present or --absent enrollment number");
            }
            let written = store.submit_attendance(&submissions).await?;
            println!("Attendance recorded for {written} students on {date}.");
        }
        Commands::MarkFaculty {
            email,
            date,
            absent,
        } => {
            let date = date.unwrap_or(today);
            let submission = AttendanceSubmission::new(email.trim(), date, !absent);
            store.submit_faculty_attendance(&[submission]).await?;
            println!("Attendance recorded for {email} on {date}.");
        }
        Commands::Summary {
            enrollment,
            faculty_email,
        } => {
            let stat = match (enrollment, faculty_email) {
                (Some(id), _) => {
                    report::with_timeout(
                        settings.report_timeout,
                        report::compute_student_summary(store, &id),
                    )
                    .await?
                }
                (None, Some(email)) => {
                    report::with_timeout(
                        settings.report_timeout,
                        report::compute_faculty_summary(store, &email),
                    )
                    .await?
                }
                (None, None) => anyhow::bail!("pass --enrollment or --faculty-email"),
            };
            let status = AttendanceStatus::from_percentage(stat.percentage);
            println!(
                "{}: {} present, {} absent, {} total, {}% ({status})",
                stat.subject_id, stat.present, stat.absent, stat.total, stat.percentage
            );
        }
        Commands::Dashboard { enrollment } => {
            let snapshot = report::with_timeout(
                settings.report_timeout,
                report::compute_student_snapshot(store, &enrollment, today),
            )
            .await?;
            println!(
                "Attendance: {}% ({}) over {} days",
                snapshot.stat.percentage, snapshot.status, snapshot.stat.total
            );
            match snapshot.today {
                Some(record) if record.is_present() => println!("Today ({today}): Present"),
                Some(_) => println!("Today ({today}): Absent"),
                None => println!("Today attendance not available."),
            }
        }
        Commands::Trend { batch, mode, days } => {
            let mut options = options;
            if let Some(days) = days {
                options.window_days = config::check_window_days(days)?;
            }
            let trend = report::with_timeout(
                settings.report_timeout,
                report::compute_batch_trend(store, &batch, &mode, &options),
            )
            .await?;
            println!("Attendance trend for {} ({}):", trend.batch, trend.mode);
            print!("{}", report::render_trend(&trend));
            if trend.skipped > 0 {
                println!("Skipped {} student(s) whose history could not be fetched.", trend.skipped);
            }
        }
        Commands::Overview { batch, format, out } => {
            let overview = report::with_timeout(
                settings.report_timeout,
                report::compute_batch_overview(store, &batch, options.concurrency),
            )
            .await?;
            let rendered = match format {
                OutputFormat::Markdown => report::render_overview(&overview),
                OutputFormat::Json => serde_json::to_string_pretty(&overview)? + "\n",
                OutputFormat::Csv => {
                    let mut buffer = Vec::new();
                    report::write_overview_csv(&mut buffer, &overview)?;
                    String::from_utf8(buffer)?
                }
            };
            emit(&rendered, out.as_ref())?;
        }
        Commands::ClassHistory { batch, date, json } => {
            let history = report::with_timeout(
                settings.report_timeout,
                report::compute_class_history(store, &batch, date, options.concurrency),
            )
            .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print!("{}", report::render_class_history(&history));
            }
        }
        Commands::AbsentToday { branch, json } => {
            let absent = report::with_timeout(
                settings.report_timeout,
                report::compute_absent_today(store, branch.as_deref(), today, options.concurrency),
            )
            .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&absent)?);
            } else {
                print!("{}", report::render_absent_today(&absent));
            }
        }
        Commands::Report { batch, out } => {
            let rendered = report::with_timeout(
                settings.report_timeout,
                report::compute_batch_report(store, &batch, &options),
            )
            .await?;
            emit(&rendered, Some(&out))?;
        }
    }

    Ok(())
}
