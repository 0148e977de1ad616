use std::fs::File;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use fleet_collector::archive::MountedDisks;
use fleet_collector::cli::{Args, Commands};
use fleet_collector::collector::Collector;
use fleet_collector::config::{load_or_create_conf, Conf};
use fleet_collector::datasource::{DataSourceResolver, DataSourceTree};
use fleet_collector::dispatch::Dispatcher;
use fleet_collector::constants::UNCLASSIFIED_FAILURE_EXIT_CODE;
use fleet_collector::errors::{exit_code_of, FatalError};
use fleet_collector::logs::LogFilter;
use fleet_collector::nodes::{InventorySource, NodeRegistry};
use fleet_collector::transport::{LocalShell, SshTransport};

fn main() {
    // Parse arguments
    let args = Args::parse();

    if let Err(e) = initialize_logging(&args) {
        eprintln!("{:#}", e);
        process::exit(UNCLASSIFIED_FAILURE_EXIT_CODE);
    }

    // Handle subcommands
    if let Some(cmd) = &args.command {
        if let Err(e) = handle_subcommand(cmd) {
            error!("{:#}", e);
            process::exit(exit_code_of(&e));
        }
        return;
    }

    match run(&args) {
        Ok(()) => {}
        Err(e) => {
            error!("{:#}", e);
            process::exit(exit_code_of(&e));
        }
    }
}

/// Terminal logger, plus a file logger when `--log-file` is given
fn initialize_logging(args: &Args) -> Result<()> {
    let log_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = &args.log_file {
        let file = File::create(path).context(format!("Failed to create log file {}", path.display()))?;
        loggers.push(WriteLogger::new(log_level, Config::default(), file));
    }
    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            Conf::default().save_to_yaml_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

fn load_conf(args: &Args) -> Result<Conf, FatalError> {
    let mut conf = load_or_create_conf(args.config.as_deref()).map_err(|e| FatalError::Config(format!("{:#}", e)))?;
    if let Some(output) = &args.output {
        conf.outdir = output.clone();
    }
    if args.maxthreads.is_some() {
        conf.max_workers = args.maxthreads;
    }
    Ok(conf)
}

fn run(args: &Args) -> Result<()> {
    info!("Starting fleet collection");

    let conf = load_conf(args)?;
    let tree = DataSourceTree::load(&conf.data_source_dir)?;
    let log_filter = if args.logs {
        Some(LogFilter::compile(&conf.log_files.filter)?)
    } else {
        None
    };

    let ssh = SshTransport::new(conf.ssh.clone());
    let source = match &args.nodes {
        Some(path) => InventorySource::File(path.clone()),
        None => InventorySource::Orchestrator,
    };
    let mut registry = NodeRegistry::load(&conf, &source, args.cluster_scope(), &ssh)?;

    if args.list {
        for line in registry.listing() {
            println!("{}", line);
        }
        return Ok(());
    }

    DataSourceResolver::new(&tree, registry.release(), args.extended).resolve_fleet(&mut registry)?;

    let shell = LocalShell::new()?;
    let collector = Collector::new(&conf, &tree, &ssh, &shell, &MountedDisks)
        .with_dispatcher(Dispatcher::new(conf.max_workers))
        .with_dry_run(args.dry_run);
    collector.run(&mut registry, log_filter.as_ref())?;

    info!("Collection complete");
    Ok(())
}
