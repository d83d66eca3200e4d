use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use std::path::PathBuf;

use cosmic_birthday::config::Config;
use cosmic_birthday::crawler::pipeline::{DatasetPipeline, FetchTarget};
use cosmic_birthday::matcher::{find_matches, parse_birth_date, BirthdayReport};
use cosmic_birthday::models::{Dataset, MoonPhase};
use cosmic_birthday::storage::{read_dataset, DATASET_FILE};

/// How lookup results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub async fn lookup(
    config: Config,
    date: &str,
    dataset: Option<PathBuf>,
    live: bool,
    format: OutputFormat,
) -> Result<()> {
    let birth = parse_birth_date(date).with_context(|| format!("Invalid birth date: {date}"))?;

    let dataset = if live {
        fetch_live(config, birth).await?
    } else {
        let path = dataset.unwrap_or_else(|| config.output.data_dir.join(DATASET_FILE));
        read_dataset(&path).with_context(|| {
            format!(
                "Failed to load dataset {} (run `cosmic-birthday fetch` first or pass --live)",
                path.display()
            )
        })?
    };

    let report = find_matches(birth, &dataset);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_text(&report)),
    }

    Ok(())
}

/// Fetch every year from the birth year on, without writing anything
async fn fetch_live(mut config: Config, birth: NaiveDate) -> Result<Dataset> {
    if birth.year() > config.fetch.end_year {
        tracing::warn!(birth_year = birth.year(), end_year = config.fetch.end_year, "Birth year after covered range");
        return Ok(Dataset::new(birth.year(), birth.year()));
    }

    config.fetch.start_year = config.fetch.start_year.max(birth.year());
    let pipeline = DatasetPipeline::new(config).context("Failed to set up live fetch")?;

    tokio::select! {
        dataset = pipeline.collect(FetchTarget::All) => Ok(dataset),
        _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
    }
}

fn render_text(report: &BirthdayReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Birthday: {}\n\n", report.birth_date.format("%B %-d, %Y")));

    for phase in [
        MoonPhase::FullMoon,
        MoonPhase::NewMoon,
        MoonPhase::FirstQuarter,
        MoonPhase::LastQuarter,
    ] {
        let years = report.moon_phases.get(phase);
        if years.is_empty() {
            out.push_str(&format!("{phase}: none\n"));
        } else {
            let list: Vec<String> = years.iter().map(i32::to_string).collect();
            out.push_str(&format!("{phase} ({}): {}\n", years.len(), list.join(", ")));
        }
    }

    out.push('\n');
    if report.eclipses.is_empty() {
        out.push_str("Eclipses: none\n");
    } else {
        out.push_str(&format!("Eclipses ({}):\n", report.eclipses.len()));
        for eclipse in &report.eclipses {
            out.push_str(&format!("  {}  {}  [{}]\n", eclipse.date, eclipse.label, eclipse.source));
        }
    }

    out
}
