use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "devmetrics",
    about = "Cycle time, lead time and sales load metrics from a Jira mirror"
)]
struct Cli {
    /// Source database (default: ~/.devmetrics/jira.db)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Warehouse database (default: ~/.devmetrics/warehouse.db)
    #[arg(long)]
    warehouse: Option<PathBuf>,

    /// Config file (default: ~/.devmetrics/config.json if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute all tables and replace them in the warehouse
    Run {
        /// Treat this instant as "now" (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,
        /// Compute and print the tables without loading them
        #[arg(long)]
        dry_run: bool,
        /// With --dry-run, print the tables as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the issues planned in a sprint
    Sprint {
        /// Sprint name, e.g. Core.S10
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the latest warehouse loads
    Status {
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
}

fn parse_as_of(as_of: Option<&str>) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    match as_of {
        None => Ok(chrono::Utc::now()),
        Some(s) => devmetrics::date_util::parse_timestamp(s)
            .ok_or_else(|| anyhow::anyhow!("invalid --as-of value: {s}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = devmetrics::Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Status { limit } => {
            let warehouse = open_warehouse(cli.warehouse.as_ref()).await?;
            print_status(&warehouse, limit).await?;
        }
        Commands::Sprint { name, json } => {
            let source = open_source(cli.source.as_ref()).await?;
            let dm = devmetrics::DevMetrics::new(source, config);
            let issues = dm.sprint(&name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&issues)?);
            } else {
                print_sprint(&name, &issues);
            }
        }
        Commands::Run { as_of, dry_run, json } => {
            let now = parse_as_of(as_of.as_deref())?;
            let source = open_source(cli.source.as_ref()).await?;
            let dm = devmetrics::DevMetrics::new(source, config);
            if dry_run {
                let tables = dm.create_tables(now).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&tables)?);
                } else {
                    print_tables(&tables);
                }
            } else {
                let warehouse = open_warehouse(cli.warehouse.as_ref()).await?;
                let reports = dm.run(&warehouse, now).await?;
                for report in &reports {
                    println!("Uploaded {} rows to {}", report.rows, report.table);
                }
                println!("Done");
            }
        }
    }

    Ok(())
}

async fn open_source(path: Option<&PathBuf>) -> anyhow::Result<devmetrics::Source> {
    Ok(match path {
        Some(p) => devmetrics::Source::open_at(p).await?,
        None => devmetrics::Source::open().await?,
    })
}

async fn open_warehouse(path: Option<&PathBuf>) -> anyhow::Result<devmetrics::Warehouse> {
    Ok(match path {
        Some(p) => devmetrics::Warehouse::open_at(p).await?,
        None => devmetrics::Warehouse::open().await?,
    })
}

async fn print_status(warehouse: &devmetrics::Warehouse, limit: u32) -> anyhow::Result<()> {
    let runs = warehouse.recent_loads(limit).await?;
    if runs.is_empty() {
        println!("No loads yet. Run 'devmetrics run' first.");
        return Ok(());
    }
    println!("Recent loads");
    for run in runs {
        println!(
            "  {}  {:<18} {:>6} rows  (run {})",
            run.loaded_at, run.table_name, run.row_count, run.run_id
        );
    }
    Ok(())
}

fn print_sprint(name: &str, issues: &[devmetrics::SprintIssue]) {
    if issues.is_empty() {
        println!("No issues in sprint {name}.");
        return;
    }
    println!("Sprint {name}: {} rows", issues.len());
    for issue in issues {
        println!(
            "  {:<10} {:<16} {:<12} sp={:<2} {}  [{}]",
            issue.key,
            issue.status,
            issue
                .done
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
            issue.story_points.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            issue.component.as_deref().unwrap_or("-"),
            issue.labels.join(", ")
        );
    }
}

fn fmt_days(days: Option<f64>) -> String {
    days.map(|d| format!("{d:.2}")).unwrap_or_else(|| "-".to_string())
}

fn print_tables(tables: &devmetrics::Tables) {
    println!("Detailed: {} rows", tables.detailed.len());

    println!("Medians (team, type: CT / LT / in progress):");
    for m in &tables.median {
        println!(
            "  {:<8} {:<20} {:>8} {:>8} {:>8}",
            m.team,
            m.issue_type,
            fmt_days(m.ct_days),
            fmt_days(m.lt_days),
            fmt_days(m.in_progress_days)
        );
    }

    println!("Sales load:");
    for b in &tables.sales_efficiency {
        println!(
            "  {}-{:02} {:<28} {:>8.2} days {:>7}%",
            b.year,
            b.month,
            b.load_type,
            b.in_progress_days,
            fmt_days(b.percentage)
        );
    }
}
