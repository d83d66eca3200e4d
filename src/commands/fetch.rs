use anyhow::{Context, Result};
use std::path::PathBuf;

use cosmic_birthday::config::Config;
use cosmic_birthday::crawler::pipeline::{DatasetPipeline, FetchTarget, PipelineReport};

/// Command-line overrides applied on top of the loaded config
#[derive(Debug, Default)]
pub struct FetchOverrides {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub batch_size: Option<usize>,
    pub delay_secs: Option<u64>,
    pub output: Option<PathBuf>,
    pub no_fallback: bool,
}

impl FetchOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(year) = self.start_year {
            config.fetch.start_year = year;
        }
        if let Some(year) = self.end_year {
            config.fetch.end_year = year;
        }
        if let Some(size) = self.batch_size {
            config.fetch.batch_size = size;
        }
        if let Some(secs) = self.delay_secs {
            config.fetch.batch_delay_secs = secs;
        }
        if let Some(dir) = self.output {
            config.output.data_dir = dir;
        }
        if self.no_fallback {
            config.sources.use_fallback = false;
        }
    }
}

/// Layer `overrides` over `config`, then validate the result
fn resolve(mut config: Config, overrides: FetchOverrides) -> Result<Config> {
    overrides.apply(&mut config);
    config.validate().context("Invalid fetch options")?;
    Ok(config)
}

pub async fn fetch(
    config: Config,
    target: FetchTarget,
    overrides: FetchOverrides,
    resume: bool,
) -> Result<()> {
    let config = resolve(config, overrides)?;

    println!("Fetching cosmic dataset");
    println!("=======================");
    println!("  Target: {target}");
    println!(
        "  Years: {}-{} ({} years)",
        config.fetch.start_year,
        config.fetch.end_year,
        config.year_count()
    );
    println!(
        "  Batches: {} years, {}s apart",
        config.fetch.batch_size, config.fetch.batch_delay_secs
    );
    println!("  Output: {}", config.output.data_dir.display());
    if resume {
        println!("  Resuming from checkpoints");
    }
    println!();

    let pipeline = DatasetPipeline::new(config).context("Failed to set up pipeline")?;

    let report = tokio::select! {
        result = pipeline.run(target, resume) => result.context("Fetch run failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; checkpoints kept for --resume");
            anyhow::bail!("interrupted");
        }
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    let counts = &report.metadata.counts;

    println!("Run {}", report.metadata.run_id);
    println!("  Moon phases: {} ({} years ok, {} failed)", counts.total_phases, counts.years_succeeded, counts.years_failed);
    println!("  Solar eclipses: {}", counts.solar_eclipses);
    println!("  Lunar eclipses: {}", counts.lunar_eclipses);
    println!("  Unparsed rows: {}", counts.parse_failures);
    println!("  Sources: {}", report.metadata.sources.join(", "));

    for (source, years) in report.failed_years.iter().filter(|(_, y)| !y.is_empty()) {
        println!("  {source}: {} failed years {:?}", years.len(), years);
    }

    println!();
    for path in &report.files {
        println!("  wrote {}", path.display());
    }
}
