mod reports;
mod simulation;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dungeon_engine::{DungeonCatalog, EngineConfig};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use simulation::{BatchResult, Policy, SimulationPlan, Simulator, resolve_dungeons};
use util::{resolve_seeds, split_csv};

#[derive(Debug, Parser)]
#[command(name = "dungeon-tester", version = "0.1.0")]
#[command(about = "Seeded dungeon run simulations against the in-memory engine")]
struct Args {
    /// Dungeons to simulate (comma-separated ids, or `all`)
    #[arg(long, default_value = "all")]
    dungeons: String,

    /// List the catalog and exit
    #[arg(long)]
    list_dungeons: bool,

    /// Seeds to run (comma-separated, decimal or 0x-hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Runs per dungeon and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Character level; defaults to each dungeon's minimum
    #[arg(long)]
    level: Option<u32>,

    /// How the simulated player handles each floor
    #[arg(long, value_enum, default_value_t = Policy::Fight)]
    policy: Policy,

    /// Dungeon catalog JSON; defaults to the bundled catalog
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Engine config JSON; defaults to built-in tuning
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let catalog = load_catalog(&args)?;

    if maybe_list_dungeons(&args, &catalog)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let config = load_config(&args)?;
    let dungeons = resolve_dungeons(&catalog, &split_csv(&args.dungeons))?;
    let seeds = resolve_seeds(&split_csv(&args.seeds))?;
    info!(
        "Simulating {} dungeon(s) x {} seed(s) x {} iteration(s)",
        dungeons.len(),
        seeds.len(),
        args.iterations
    );

    let simulator = Simulator::new(catalog, config, args.verbose);
    let mut results = Vec::with_capacity(dungeons.len() * seeds.len());
    for dungeon_id in &dungeons {
        for &seed in &seeds {
            results.push(simulator.run(&SimulationPlan {
                dungeon_id: dungeon_id.clone(),
                seed,
                iterations: args.iterations,
                level: args.level,
                policy: args.policy,
            })?);
        }
    }

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn load_catalog(args: &Args) -> Result<DungeonCatalog> {
    match &args.catalog {
        Some(path) => DungeonCatalog::load_from_path(path)
            .with_context(|| format!("loading catalog {}", path.display())),
        None => DungeonCatalog::load_default().context("loading bundled catalog"),
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    match &args.config {
        Some(path) => EngineConfig::load_from_path(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn maybe_list_dungeons(args: &Args, catalog: &DungeonCatalog) -> Result<bool> {
    if !args.list_dungeons {
        return Ok(false);
    }
    let mut sink = ReportSink::open(args.output.as_deref())?;
    writeln!(sink, "Available dungeons:")?;
    for dungeon in catalog.list(false) {
        let state = if dungeon.active { "" } else { " (closed)" };
        writeln!(
            sink,
            "  {:20} - {:?}, level {}+, {} energy, {} floors{state}",
            dungeon.id,
            dungeon.difficulty,
            dungeon.min_level,
            dungeon.energy_cost,
            dungeon.floor_count
        )?;
    }
    sink.finish()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🗝️  Dungeon Run Tester".bright_cyan().bold());
    println!("{}", "======================".cyan());
}

fn write_reports(args: &Args, results: &[BatchResult], start_time: Instant) -> Result<()> {
    let mut sink = ReportSink::open(args.output.as_deref())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut sink, results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut sink,
                    "# Dungeon Simulation Results\n\n_No dungeons simulated._"
                )?;
            } else {
                reports::generate_markdown_report(&mut sink, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut sink, "No dungeons simulated.")?;
            } else {
                reports::generate_console_report(&mut sink, results, start_time.elapsed())?;
            }
        }
    }

    if args.report != "json" {
        let duration = start_time.elapsed();
        writeln!(&mut sink)?;
        writeln!(&mut sink, "🏁 Total time: {duration:?}")?;
    }
    sink.finish()
}

/// Where reports go: stdout, or a file named by `--output`.
enum ReportSink {
    Console(BufWriter<std::io::Stdout>),
    Disk { path: PathBuf, out: BufWriter<File> },
}

impl ReportSink {
    fn open(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::Console(BufWriter::new(stdout())));
        };
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self::Disk {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    /// Flush buffered output, naming the file on failure.
    fn finish(mut self) -> Result<()> {
        let flushed = self.flush();
        match &self {
            Self::Console(_) => flushed.context("failed to flush stdout"),
            Self::Disk { path, .. } => {
                flushed.with_context(|| format!("failed to write {}", path.display()))
            }
        }
    }
}

impl Write for ReportSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Console(out) => out.write(buf),
            Self::Disk { out, .. } => out.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Console(out) => out.flush(),
            Self::Disk { out, .. } => out.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            dungeons: String::from("mossy-cellar"),
            list_dungeons: false,
            seeds: String::from("1337"),
            iterations: 1,
            level: None,
            policy: Policy::Fight,
            catalog: None,
            config: None,
            report: String::from("console"),
            verbose: false,
            output: None,
        }
    }

    #[test]
    fn list_dungeons_writes_output() {
        let temp = std::env::temp_dir().join("dungeon-tester-list.txt");
        let args = Args {
            list_dungeons: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        let catalog = load_catalog(&args).unwrap();
        assert!(maybe_list_dungeons(&args, &catalog).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available dungeons"));
        assert!(content.contains("mossy-cellar"));
        assert!(content.contains("(closed)"));
    }

    #[test]
    fn list_dungeons_returns_false_when_disabled() {
        let args = base_args();
        let catalog = load_catalog(&args).unwrap();
        assert!(!maybe_list_dungeons(&args, &catalog).unwrap());
    }

    #[test]
    fn markdown_report_handles_empty_results() {
        let temp = std::env::temp_dir().join("dungeon-tester-report.md");
        let args = Args {
            report: String::from("markdown"),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("No dungeons simulated"));
    }

    #[test]
    fn report_sink_names_the_file_it_cannot_create() {
        let path = PathBuf::from("/definitely/not/here/report.txt");
        let err = ReportSink::open(Some(&path)).err().unwrap();
        assert!(format!("{err:#}").contains("/definitely/not/here/report.txt"));
    }

    #[test]
    fn report_sink_writes_through_to_disk_on_finish() {
        let temp = std::env::temp_dir().join("dungeon-tester-sink.txt");
        let mut sink = ReportSink::open(Some(&temp)).unwrap();
        assert!(matches!(sink, ReportSink::Disk { .. }));
        write!(sink, "floor ").unwrap();
        writeln!(sink, "cleared").unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(temp).unwrap(), "floor cleared\n");
        assert!(matches!(ReportSink::open(None).unwrap(), ReportSink::Console(_)));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = Args {
            config: Some(PathBuf::from("/definitely/not/here.json")),
            ..base_args()
        };
        let err = load_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("loading config"));
    }
}
