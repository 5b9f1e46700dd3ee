use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;

use clinops_metrics::schema::{
    ArrowSchema, AUDIT_VIEW, DATA_QUALITY_REPORT, ENCOUNTER_FACTS, ENCOUNTERS,
    EVENT_METRICS_MONTHLY, KPI_MONTHLY_OVERALL, KPI_MONTHLY_SERVICE, MED_ORDERS, PATIENTS,
    REPORTING_DELAY_BINS, SAFETY_EVENTS,
};
use clinops_metrics::utils::logging::console::print_quality_report;
use clinops_metrics::utils::logging::{create_stage_progress_bar, finish_progress_bar};
use clinops_metrics::{
    DelayBinCount, Encounter, EncounterFact, EventMetric, KpiMonthly, MedicationOrder, Patient,
    PipelineConfig, QualityCheck, SafetyEvent, TableStore, pipeline,
};

#[derive(Parser)]
#[command(name = "clinops", version, about = "Derive medication safety KPIs from hospital tables")]
struct Cli {
    /// Directory holding the table files
    #[arg(long, global = true, env = "CLINOPS_DATA_DIR", default_value = "./db")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Rebuild every derived table from the raw tables")]
    Run,
    #[command(about = "Check that every required table was delivered")]
    Verify,
    #[command(about = "Print the rows of a table as JSON lines")]
    Show {
        #[arg(help = "Name of the table to print")]
        table: String,
        #[arg(long, help = "Print at most this many rows")]
        limit: Option<usize>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = TableStore::open(&cli.data_dir)
        .with_context(|| format!("failed to open data directory {}", cli.data_dir.display()))?;

    match cli.command {
        Command::Run => run(&store),
        Command::Verify => verify(&store),
        Command::Show { table, limit } => {
            show(&store, &table, limit)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(store: &TableStore) -> anyhow::Result<ExitCode> {
    let config = PipelineConfig::from_env();
    info!("{config}");

    let pb = create_stage_progress_bar(pipeline::STAGE_COUNT, Some("Loading raw tables"));
    let summary = match pipeline::run_full_pipeline_with_progress(store, &config, Some(&pb)) {
        Ok(summary) => summary,
        Err(e) => {
            pb.abandon_with_message("Pipeline failed");
            return Err(e).context("pipeline run failed");
        }
    };
    finish_progress_bar(&pb, Some("Pipeline complete"));

    println!("Derived tables:");
    for (table, rows) in &summary.tables {
        println!("  {table}: {rows} rows");
    }
    println!("Data quality:");
    print_quality_report(&summary.quality);
    println!("Finished in {:?}", summary.elapsed);
    Ok(ExitCode::SUCCESS)
}

fn verify(store: &TableStore) -> anyhow::Result<ExitCode> {
    let report = pipeline::verify_delivery(store).context("failed to inspect tables")?;

    println!("Tables:");
    for (table, rows) in &report.present {
        println!("  {table}: {rows} rows");
    }
    if !report.missing.is_empty() {
        println!("Missing tables: {}", report.missing.join(", "));
    }
    match report.duplicate_facts {
        Some(0) => println!("{ENCOUNTER_FACTS}: one row per encounter"),
        Some(extra) => println!("{ENCOUNTER_FACTS}: {extra} duplicate rows"),
        None => {}
    }
    if let Some(checks) = &report.quality {
        println!("Data quality:");
        print_quality_report(checks);
    }

    if report.is_complete() {
        println!("Delivery complete");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Delivery incomplete");
        Ok(ExitCode::FAILURE)
    }
}

fn show(store: &TableStore, table: &str, limit: Option<usize>) -> anyhow::Result<()> {
    match table {
        PATIENTS => print_rows::<Patient>(store, table, limit),
        ENCOUNTERS => print_rows::<Encounter>(store, table, limit),
        MED_ORDERS => print_rows::<MedicationOrder>(store, table, limit),
        SAFETY_EVENTS => print_rows::<SafetyEvent>(store, table, limit),
        ENCOUNTER_FACTS | AUDIT_VIEW => print_rows::<EncounterFact>(store, table, limit),
        KPI_MONTHLY_SERVICE | KPI_MONTHLY_OVERALL => print_rows::<KpiMonthly>(store, table, limit),
        EVENT_METRICS_MONTHLY => print_rows::<EventMetric>(store, table, limit),
        REPORTING_DELAY_BINS => print_rows::<DelayBinCount>(store, table, limit),
        DATA_QUALITY_REPORT => print_rows::<QualityCheck>(store, table, limit),
        other => bail!(
            "unknown table '{other}', stored tables: {}",
            store.table_names()?.join(", ")
        ),
    }
}

fn print_rows<T: ArrowSchema>(
    store: &TableStore,
    table: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let batch = store
        .query(table)
        .with_context(|| format!("failed to read table {table}"))?;
    let rows = T::from_record_batch(table, &batch)?;

    let mut out = io::stdout().lock();
    for row in rows.iter().take(limit.unwrap_or(usize::MAX)) {
        serde_json::to_writer(&mut out, row)?;
        writeln!(out)?;
    }
    Ok(())
}
