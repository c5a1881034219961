mod commands;
mod logging;
mod progress;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::anyhow;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use mc_scanner_core::{
    AppConfig, BlockRegistry, BlockState, Bounds, Error, ItemType, LoopMode, Needle, NeedleSet,
    OutputSink, OutputTarget, ScanEngine, ScanRequest, ScanRun, SearchPolicy, StatsTable,
};
use progress::CliReporter;
use tracing::{error, info};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match mc_scanner_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::from(1);
        }
    };

    match &args.command {
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            ExitCode::SUCCESS
        }
        None => match run_scan(&args, &config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                if let Some(Error::InvalidArgument(msg)) = err.downcast_ref::<Error>() {
                    eprintln!("{} {}\n", "error:".red().bold(), msg);
                    let _ = Cli::command().print_help();
                    return ExitCode::from(2);
                }
                error!("Error: {:#}", err);
                ExitCode::from(1)
            }
        },
    }
}

fn build_request(args: &Cli, config: &AppConfig) -> anyhow::Result<ScanRequest> {
    let mut needles = Vec::new();
    for block in &args.blocks {
        needles.push(Needle::BlockState(BlockState::parse(block)?));
    }
    for item in &args.items {
        needles.push(Needle::ItemType(ItemType::parse(item)?));
    }

    let registry = match &config.block_registry {
        Some(path) => BlockRegistry::load(Path::new(path))
            .map_err(|err| anyhow!("cannot load block registry {}: {}", path, err))?,
        None => BlockRegistry::builtin(),
    };

    let stats = if args.stats {
        Some(match &config.stats_weights {
            Some(path) => StatsTable::load(Path::new(path))
                .map_err(|err| anyhow!("cannot load stats weights {}: {}", path, err))?,
            None => StatsTable::default(),
        })
    } else {
        None
    };

    let roots: Vec<PathBuf> = if args.paths.is_empty() {
        config.root_paths.iter().map(PathBuf::from).collect()
    } else {
        args.paths.clone()
    };
    if roots.is_empty() {
        return Err(Error::InvalidArgument(
            "no world given; pass --path or set root_paths".to_string(),
        )
        .into());
    }

    Ok(ScanRequest {
        roots,
        ignore_patterns: config.ignore_patterns.clone(),
        needles: NeedleSet::new(needles, &registry),
        stats,
    })
}

fn run_scan(args: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    let request = build_request(args, config)?;
    // must precede OutputSink::open, which truncates
    if request.needles.is_empty() && !request.is_stats() {
        println!("Nothing to search for.");
        return Ok(());
    }
    for needle in request.needles.originals() {
        info!("Searching for {}", needle.to_string().cyan());
    }
    let bounds = match (&args.within, &config.within) {
        (Some(bounds), _) => Some(bounds.clone()),
        (None, Some(text)) => Some(text.parse::<Bounds>()?),
        (None, None) => None,
    };
    if let Some(bounds) = &bounds {
        info!("Limited to {}", bounds);
    }

    let out = args
        .out
        .clone()
        .or_else(|| config.output.as_ref().map(PathBuf::from))
        .unwrap_or_default();
    let mut sink = OutputSink::open(OutputTarget::from_path(&out))?;
    let engine = ScanEngine::new(
        args.threads.unwrap_or(config.threads),
        args.decompressor.unwrap_or(config.decompressor),
    )?;
    let reporter = CliReporter::new();
    let loop_mode = LoopMode::from_flag(args.repeat);

    let mut completed: u64 = 0;
    loop {
        let mut json = sink.json_writer()?;
        let policy = SearchPolicy::new(sink.report_writer(completed as usize)?)
            .with_bounds(bounds.clone());
        let run = engine.run(
            &request,
            &policy,
            &reporter,
            json.as_mut().map(|w| w as &mut dyn Write),
        )?;
        drop(policy);
        print_summary(&run, completed);

        completed += 1;
        if !loop_mode.should_continue(completed) {
            break;
        }
    }

    sink.finish()?;
    Ok(())
}

fn print_summary(run: &ScanRun, index: u64) {
    info!(
        "Run {}: {} files scanned in {}, {} results",
        index + 1,
        format!("{}", run.scanned_files).green(),
        format!("{:.2}s", run.duration.as_secs_f64()).green(),
        format!("{}", run.results.len()).cyan(),
    );
    if run.failed_files > 0 {
        info!(
            "{} files could not be scanned, see the log for details",
            format!("{}", run.failed_files).red(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn nothing_to_search_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.json");
        fs::write(&out, "[\"previous\"]").unwrap();
        let args = Cli::try_parse_from([
            "mc-scanner",
            "-p",
            dir.path().to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();

        run_scan(&args, &AppConfig::default()).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "[\"previous\"]");
    }

    #[test]
    fn configured_bounds_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let args =
            Cli::try_parse_from(["mc-scanner", "-p", dir.path().to_str().unwrap(), "-b", "stone"])
                .unwrap();
        let config = AppConfig {
            within: Some("overworld,1,2".to_string()),
            ..AppConfig::default()
        };
        let err = run_scan(&args, &config).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidArgument(_))));
    }
}
