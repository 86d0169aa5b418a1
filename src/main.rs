use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use valuetrace::cli::{Cli, Commands, OutputFormat};
use valuetrace::config::{load_config, load_config_from, AnalysisConfig};
use valuetrace::report::{build_report, render_json, render_text, ColorMode};
use valuetrace::{AnalysisContext, Compilation};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            paths,
            format,
            config,
            plain,
            jobs,
            verbosity,
        } => {
            init_logging(verbosity);
            configure_thread_pool(jobs);
            let config = resolve_config(config.as_deref(), &paths)?;
            let clean = handle_analyze(&paths, format, plain, &config)?;
            if !clean {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn configure_thread_pool(jobs: usize) {
    if jobs == 0 {
        return;
    }
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
        log::warn!("Failed to configure {} worker threads: {}", jobs, e);
    }
}

fn resolve_config(explicit: Option<&Path>, paths: &[PathBuf]) -> Result<AnalysisConfig> {
    if let Some(file) = explicit {
        return load_config_from(file).with_context(|| format!("loading {}", file.display()));
    }
    let start = match paths.first() {
        Some(path) if path.is_dir() => path.clone(),
        Some(path) => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        None => PathBuf::new(),
    };
    let start = if start.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        start.canonicalize().unwrap_or(start)
    };
    Ok(load_config(&start)?)
}

/// Returns whether the sources are free of `DisposeMember` findings.
fn handle_analyze(paths: &[PathBuf], format: OutputFormat, plain: bool, config: &AnalysisConfig) -> Result<bool> {
    let compilation = Compilation::from_paths(paths)?;
    let ctx = AnalysisContext::new(&compilation, config);
    let mut report = build_report(&ctx)?;
    report.skipped = compilation.skipped().iter().map(|s| s.path.clone()).collect();

    match format {
        OutputFormat::Text => {
            let mode = if plain { ColorMode::Never } else { ColorMode::from_env() };
            mode.apply();
            print!("{}", render_text(&report));
        }
        OutputFormat::Json => println!("{}", render_json(&report)?),
    }
    Ok(!report.has_dispose_member_findings())
}
