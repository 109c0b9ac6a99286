use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lasertrace::{
    init_logging, spawn_interrupt_watcher, BurnOutcome, CancelFlag, CoarseSource, Config,
    ConsoleOperator, LoggingOperator, Pipeline, PipelineStage,
};
use lasertrace_calibration::Operator;
use lasertrace_core::VoltagePoint;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lasertrace")]
#[command(about = "Galvo laser calibration and rotary tumour burning")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or JSON); defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use in-process simulated devices instead of the bench
    #[arg(long, global = true)]
    simulate: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align the stage, fine tune the 3×3 grid and record reference centroids.
    Calibrate(CoarseArgs),

    /// Point the beam at every calibrated cell and store a frame of each.
    Verify {
        /// Walk the coarse grid instead of the fine grid
        #[arg(long)]
        coarse: bool,
    },

    /// Capture one silhouette per degree of stage rotation.
    Tomography,

    /// Run the configured reconstruction command.
    GenerateModel,

    /// Trace the tumour slice by slice over a full revolution.
    BurnTumour {
        /// Compute the plan only; the laser and stage are never touched
        #[arg(long = "static")]
        dry_run: bool,

        /// Where to write the plan of a static run
        #[arg(long)]
        plan_out: Option<PathBuf>,
    },

    /// Run a stage and every stage after it.
    Run {
        #[arg(long, value_enum, default_value_t = PipelineStage::Calibrate)]
        from: PipelineStage,

        #[command(flatten)]
        coarse: CoarseArgs,
    },

    /// List serial ports that may host the stage controller.
    ListPorts,

    /// Write the default configuration.
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct CoarseArgs {
    /// Take the coarse grid from operator confirmed corners instead of the stored record
    #[arg(long, requires_all = ["top_left", "bottom_right"])]
    manual: bool,

    /// Beam voltages on the top-left target, "X,Y"
    #[arg(long, value_parser = parse_voltage, allow_hyphen_values = true)]
    top_left: Option<VoltagePoint>,

    /// Beam voltages on the bottom-right target, "X,Y"
    #[arg(long, value_parser = parse_voltage, allow_hyphen_values = true)]
    bottom_right: Option<VoltagePoint>,
}

impl CoarseArgs {
    fn source(&self, config: &Config) -> CoarseSource {
        match (self.manual, self.top_left, self.bottom_right) {
            (true, Some(top_left), Some(bottom_right)) => CoarseSource::Corners {
                top_left,
                bottom_right,
            },
            _ => CoarseSource::Restore(config.paths.calibration_record.clone()),
        }
    }
}

fn parse_voltage(s: &str) -> std::result::Result<VoltagePoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad X voltage: {}", e))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad Y voltage: {}", e))?;
    Ok(VoltagePoint::new(x, y))
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Ok(Config::default_path()?),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = config_path(cli)?;
    if path.exists() {
        Config::load_from_file(&path).with_context(|| format!("loading {}", path.display()))
    } else {
        tracing::info!("No configuration at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;
    tracing::debug!("lasertrace {} (built {})", lasertrace::VERSION, lasertrace::BUILD_DATE);

    match &cli.command {
        Commands::ListPorts => {
            for port in lasertrace_communication::list_ports()? {
                println!("{}\t{}", port.port_name, port.description);
            }
            return Ok(());
        }
        Commands::InitConfig { force } => {
            let path = config_path(&cli)?;
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to replace it)", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote {}", path.display());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    let cancel = CancelFlag::new();
    spawn_interrupt_watcher(cancel.clone()).context("starting interrupt watcher")?;
    let operator: Box<dyn Operator> = if cli.simulate {
        Box::new(LoggingOperator)
    } else {
        Box::new(ConsoleOperator)
    };
    let mut pipeline = Pipeline::new(config, cli.simulate, cancel, operator);

    match &cli.command {
        Commands::Calibrate(coarse) => {
            let source = coarse.source(pipeline.config());
            let outcome = pipeline.calibrate(&source)?;
            println!("{}", serde_json::to_string_pretty(&outcome.record)?);
        }
        Commands::Verify { coarse } => {
            let stored = pipeline.verify(*coarse)?;
            println!("Stored {} verification frames", stored.len());
        }
        Commands::Tomography => {
            let stored = pipeline.tomography()?;
            println!("Stored {} tomography frames", stored.len());
        }
        Commands::GenerateModel => {
            let artifacts = pipeline.generate_model()?;
            println!("Model has {} points", artifacts.coordinates.len());
        }
        Commands::BurnTumour { dry_run, plan_out } => {
            match pipeline.burn(*dry_run, plan_out.as_deref())? {
                BurnOutcome::Burned(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                BurnOutcome::Planned(plan) => println!(
                    "Planned {} steps, {} points",
                    plan.steps.len(),
                    plan.point_count()
                ),
            }
        }
        Commands::Run { from, coarse } => {
            let source = coarse.source(pipeline.config());
            pipeline.run_from(*from, &source)?;
        }
        Commands::ListPorts | Commands::InitConfig { .. } => {}
    }

    Ok(())
}
