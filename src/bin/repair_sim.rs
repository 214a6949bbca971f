//! repair-sim: run the repair pipeline from the command line.

use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use repair_pipeline::builders::{Preset, WorkloadBuilder};
use repair_pipeline::config::{PipelineConfig, Strategy};
use repair_pipeline::core::{AppResult, Category, PipelineScheduler, RunReport, TracingEventSink, WorkItemFactory};
use repair_pipeline::util::init_tracing;

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// One persistent worker per stage
    Persistent,
    /// One task per item
    FanOut,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Persistent => Self::Persistent,
            StrategyArg::FanOut => Self::FanOut,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    /// 10 A, 10 B, 10 C
    Balanced,
    /// 20 A, 5 B, 5 C
    HighPriorityHeavy,
    /// 5 A, 5 B, 20 C
    LowPriorityHeavy,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Balanced => Self::Balanced,
            PresetArg::HighPriorityHeavy => Self::HighPriorityHeavy,
            PresetArg::LowPriorityHeavy => Self::LowPriorityHeavy,
        }
    }
}

#[derive(Parser)]
#[command(name = "repair-sim", about = "Simulate vehicles flowing through a repair workshop")]
struct Cli {
    /// Category mix to run; overridden per category by --category-*
    #[arg(long, value_enum, default_value = "balanced")]
    preset: PresetArg,
    /// Number of mechanical (A) vehicles
    #[arg(long)]
    category_a: Option<usize>,
    /// Number of electrical (B) vehicles
    #[arg(long)]
    category_b: Option<usize>,
    /// Number of bodywork (C) vehicles
    #[arg(long)]
    category_c: Option<usize>,
    /// Number of bays
    #[arg(long)]
    bays: Option<u32>,
    /// Number of technicians
    #[arg(long)]
    technicians: Option<u32>,
    /// Concurrency strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    /// Run both strategies on the same workload and compare
    #[arg(long)]
    compare: bool,
    /// Length of one phase unit in milliseconds
    #[arg(long)]
    time_unit_ms: Option<u64>,
    /// Maximum pause between submissions in milliseconds
    #[arg(long)]
    jitter_ms: Option<u64>,
    /// Seed for submission order and jitter
    #[arg(long)]
    seed: Option<u64>,
    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> AppResult<PipelineConfig> {
        let mut config = PipelineConfig::from_env().map_err(|e| anyhow!(e))?;
        if let Some(bays) = self.bays {
            config.bay_capacity = bays;
        }
        if let Some(technicians) = self.technicians {
            config.technician_capacity = technicians;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if let Some(unit) = self.time_unit_ms {
            config.time_unit_ms = unit;
        }
        if let Some(jitter) = self.jitter_ms {
            config.submission_jitter_ms = jitter;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate().map_err(|e| anyhow!(e))?;
        Ok(config)
    }

    fn workload(&self) -> WorkloadBuilder {
        let overrides = [
            (Category::A, self.category_a),
            (Category::B, self.category_b),
            (Category::C, self.category_c),
        ];
        overrides
            .into_iter()
            .fold(Preset::from(self.preset).builder(), |builder, (category, count)| match count {
                Some(count) => builder.with_category(category, count),
                None => builder,
            })
    }
}

fn run_once(config: &PipelineConfig, workload: &WorkloadBuilder) -> AppResult<RunReport> {
    let items = workload.build(&WorkItemFactory::new(config.time_unit()));
    let mut scheduler = PipelineScheduler::new(config.clone())?;
    scheduler.add_event_sink(Box::new(TracingEventSink));
    let report = scheduler
        .run(items)
        .with_context(|| format!("{} run failed", config.strategy))?;
    scheduler.shutdown();
    Ok(report)
}

/// Per-category completion counts, e.g. `A mechanical 3, B electrical 1, ...`.
fn category_mix(report: &RunReport) -> String {
    let counts = report.category_counts();
    Category::ALL
        .iter()
        .map(|category| {
            let count = counts.get(category).copied().unwrap_or(0);
            format!("{category} {} {count}", category.repair_kind())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_summary(report: &RunReport) {
    println!(
        "{:<10} {:>3} vehicles ({}) in {:.3}s, peak bays {}, peak technicians {}",
        report.strategy.to_string(),
        report.completed.len(),
        category_mix(report),
        report.elapsed.as_secs_f64(),
        report.peak_bays,
        report.peak_technicians,
    );
}

fn compare(first: &RunReport, second: &RunReport) -> String {
    let (fast, slow) = if first.elapsed <= second.elapsed {
        (first, second)
    } else {
        (second, first)
    };
    let gap: Duration = slow.elapsed - fast.elapsed;
    // Relative to the slower run.
    let percent = if slow.elapsed.is_zero() {
        0.0
    } else {
        gap.as_secs_f64() / slow.elapsed.as_secs_f64() * 100.0
    };
    format!(
        "{} was faster by {:.3}s ({percent:.2}%, {:.3}s vs {:.3}s)",
        fast.strategy,
        gap.as_secs_f64(),
        fast.elapsed.as_secs_f64(),
        slow.elapsed.as_secs_f64()
    )
}

fn main() -> AppResult<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config()?;
    let workload = cli.workload();

    let strategies = if cli.compare {
        Strategy::ALL.to_vec()
    } else {
        vec![config.strategy]
    };

    let mut reports = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let config = config.clone().with_strategy(strategy);
        let report = run_once(&config, &workload)?;
        if cli.json {
            println!("{}", report.to_json()?);
        } else {
            print_summary(&report);
        }
        reports.push(report);
    }

    if let [first, second] = reports.as_slice() {
        if !cli.json {
            println!("{}", compare(first, second));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repair_pipeline::core::WorkItem;
    use uuid::Uuid;

    fn report(strategy: Strategy, elapsed: Duration, completed: Vec<WorkItem>) -> RunReport {
        RunReport {
            run_id: Uuid::nil(),
            strategy,
            elapsed,
            completed,
            events: Vec::new(),
            peak_bays: 0,
            peak_technicians: 0,
        }
    }

    #[test]
    fn test_compare_reports_relative_gap() {
        let persistent = report(Strategy::Persistent, Duration::from_secs(4), Vec::new());
        let fan_out = report(Strategy::FanOut, Duration::from_secs(3), Vec::new());
        let line = compare(&persistent, &fan_out);
        assert!(line.starts_with(&format!("{} was faster by 1.000s", Strategy::FanOut)), "{line}");
        assert!(line.contains("25.00%"), "{line}");
    }

    #[test]
    fn test_compare_equal_zero_runs() {
        let first = report(Strategy::Persistent, Duration::ZERO, Vec::new());
        let second = report(Strategy::FanOut, Duration::ZERO, Vec::new());
        assert!(compare(&first, &second).contains("0.00%"));
    }

    #[test]
    fn test_category_mix_names_repair_kinds() {
        let factory = WorkItemFactory::new(Duration::from_millis(1));
        let completed = vec![
            factory.create(1, Category::A),
            factory.create(2, Category::A),
            factory.create(3, Category::C),
        ];
        let mix = category_mix(&report(Strategy::FanOut, Duration::ZERO, completed));
        assert_eq!(mix, "A mechanical 2, B electrical 0, C bodywork 1");
    }
}
