//! Stage chain from plate calibration to tumour burn
//!
//! Stages run in a fixed order. `run_from` starts at any stage and carries
//! on to the end, so an interrupted chain can be resumed where it stopped.

use crate::session::{burn_config, routine_config, Session};
use anyhow::{bail, Context, Result};
use lasertrace_calibration::{
    verify_grid, CalibrationRecord, CalibrationRoutine, CentroidSet, CoarseSource, Operator,
    RoutineOutcome,
};
use lasertrace_core::CancelFlag;
use lasertrace_settings::Config;
use lasertrace_targeting::{
    acquire_tomography, session_mapper, BurnPlan, BurnReport, BurnSequencer,
    ReconstructionArtifacts, TomographyConfig,
};
use lasertrace_vision::DirectorySink;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// One step of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PipelineStage {
    Calibrate,
    WaitForOperator,
    Tomography,
    GenerateModel,
    BurnTumour,
}

static STAGE_ORDER: [PipelineStage; 5] = [
    PipelineStage::Calibrate,
    PipelineStage::WaitForOperator,
    PipelineStage::Tomography,
    PipelineStage::GenerateModel,
    PipelineStage::BurnTumour,
];

impl PipelineStage {
    /// This stage and every later one
    pub fn chain_from(self) -> &'static [PipelineStage] {
        let start = STAGE_ORDER.iter().position(|s| *s == self).unwrap_or(0);
        &STAGE_ORDER[start..]
    }
}

/// Prompts on stdout and waits for enter
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn acknowledge(&mut self, message: &str) -> lasertrace_core::Result<()> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{} and press enter... ", message)?;
        stdout.flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(())
    }
}

/// Logs prompts and continues, for unattended dry runs
#[derive(Debug, Default)]
pub struct LoggingOperator;

impl Operator for LoggingOperator {
    fn acknowledge(&mut self, message: &str) -> lasertrace_core::Result<()> {
        tracing::info!("Operator step skipped: {}", message);
        Ok(())
    }
}

/// Result of the burn stage
#[derive(Debug, Clone)]
pub enum BurnOutcome {
    Burned(BurnReport),
    Planned(BurnPlan),
}

pub struct Pipeline {
    config: Config,
    simulate: bool,
    cancel: CancelFlag,
    operator: Box<dyn Operator>,
    session: Option<Session>,
}

impl Pipeline {
    pub fn new(config: Config, simulate: bool, cancel: CancelFlag, operator: Box<dyn Operator>) -> Self {
        Self {
            config,
            simulate,
            cancel,
            operator,
            session: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Hardware is opened on first use, so a dry run never touches it
    fn session<'s>(slot: &'s mut Option<Session>, config: &Config, simulate: bool) -> Result<&'s mut Session> {
        if slot.is_none() {
            let session = if simulate {
                Session::simulated(config)?
            } else {
                Session::open(config)?
            };
            *slot = Some(session);
        }
        slot.as_mut().context("session unavailable")
    }

    pub fn calibrate(&mut self, source: &CoarseSource) -> Result<RoutineOutcome> {
        let routine_cfg = routine_config(&self.config);
        let session = Self::session(&mut self.session, &self.config, self.simulate)?;
        let mut routine = CalibrationRoutine {
            galvo: &mut session.galvo,
            laser: session.laser.as_mut(),
            stage: session.stage.as_mut(),
            laser_camera: session.laser_camera.as_mut(),
            reference_camera: session.reference_camera.as_mut(),
            analysis: session.analysis.as_ref(),
            operator: self.operator.as_mut(),
        };
        let outcome = routine
            .run(source, &routine_cfg, &self.cancel)
            .context("calibration routine failed")?;
        tracing::info!(
            "Calibration complete, stage aligned at {:+.2}°",
            outcome.alignment.best_angle
        );
        Ok(outcome)
    }

    /// Walk a stored grid and keep one frame per cell
    pub fn verify(&mut self, coarse: bool) -> Result<Vec<PathBuf>> {
        let record = CalibrationRecord::load(&self.config.paths.calibration_record)
            .context("loading calibration record")?;
        let grid = if coarse {
            record.coarse_grid
        } else {
            record.fine_grid
        };
        let dwell = Duration::from_millis(self.config.calibration.verify_dwell_ms);
        let mut sink = DirectorySink::new(&self.config.paths.calibration_frames);

        let session = Self::session(&mut self.session, &self.config, self.simulate)?;
        let stored = verify_grid(
            &grid,
            &mut session.galvo,
            session.laser.as_mut(),
            session.laser_camera.as_mut(),
            &mut sink,
            dwell,
            &self.cancel,
        )?;
        Ok(stored)
    }

    pub fn wait_for_operator(&mut self) -> Result<()> {
        self.operator
            .acknowledge("Remove the calibration plate and mount the tumour")?;
        Ok(())
    }

    pub fn tomography(&mut self) -> Result<Vec<PathBuf>> {
        let mut sink = DirectorySink::new(&self.config.paths.tomography_frames);
        self.operator.acknowledge("Turn on the light panel")?;

        let session = Self::session(&mut self.session, &self.config, self.simulate)?;
        let stored = acquire_tomography(
            session.stage.as_mut(),
            session.reference_camera.as_mut(),
            &mut sink,
            &TomographyConfig::default(),
            &self.cancel,
        )
        .context("tomography failed")?;

        self.operator.acknowledge("Turn off the light panel")?;
        Ok(stored)
    }

    /// Run the external reconstruction and check what it wrote
    pub fn generate_model(&self) -> Result<ReconstructionArtifacts> {
        let paths = &self.config.paths;
        let Some((program, args)) = paths.reconstruction_command.split_first() else {
            bail!("no reconstruction command configured (paths.reconstruction_command)");
        };
        let args: Vec<String> = args
            .iter()
            .map(|a| {
                a.replace("{frames}", &paths.tomography_frames.display().to_string())
                    .replace("{coordinates}", &paths.coordinates.display().to_string())
                    .replace("{center}", &paths.center.display().to_string())
            })
            .collect();

        tracing::info!("Running reconstruction: {} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(&args)
            .status()
            .with_context(|| format!("starting {}", program))?;
        if !status.success() {
            bail!("reconstruction exited with {}", status);
        }

        let artifacts = ReconstructionArtifacts::load(&paths.coordinates, &paths.center)
            .context("reading reconstruction output")?;
        Ok(artifacts)
    }

    /// Burn the tumour, or with `dry_run` only compute the plan
    pub fn burn(&mut self, dry_run: bool, plan_out: Option<&Path>) -> Result<BurnOutcome> {
        let paths = &self.config.paths;
        let record = CalibrationRecord::load(&paths.calibration_record)
            .context("loading calibration record")?;
        let reference = CentroidSet::load(&paths.reference_centroids)
            .context("loading reference centroids")?;
        let mapper = session_mapper(
            &reference,
            self.config.calibration.centroid_shift,
            &record.fine_grid,
        )?;
        let mut tumour = ReconstructionArtifacts::load(&paths.coordinates, &paths.center)
            .context("loading tumour model")?
            .tumour(self.config.burn.image_height);
        let burn_cfg = burn_config(&self.config);

        if dry_run {
            let plan = BurnSequencer::plan(&mut tumour, &mapper, &burn_cfg)?;
            plan.save(plan_out.unwrap_or(paths.burn_plan.as_path()))?;
            return Ok(BurnOutcome::Planned(plan));
        }

        let session = Self::session(&mut self.session, &self.config, self.simulate)?;
        let report = BurnSequencer::new(
            &mut session.galvo,
            session.laser.as_mut(),
            session.stage.as_mut(),
            mapper,
            burn_cfg,
        )
        .run(&mut tumour, &self.cancel)
        .context("burn session aborted")?;
        Ok(BurnOutcome::Burned(report))
    }

    /// Run `from` and every later stage
    pub fn run_from(&mut self, from: PipelineStage, source: &CoarseSource) -> Result<()> {
        for &stage in from.chain_from() {
            tracing::info!("Pipeline stage {:?}", stage);
            self.cancel.check()?;
            if let Err(e) = self.run_stage(stage, source) {
                if needs_operator(&e) {
                    tracing::error!(
                        "Stage {:?} aborted, operator intervention required before resuming: {:#}",
                        stage,
                        e
                    );
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn run_stage(&mut self, stage: PipelineStage, source: &CoarseSource) -> Result<()> {
        match stage {
            PipelineStage::Calibrate => {
                self.calibrate(source)?;
            }
            PipelineStage::WaitForOperator => self.wait_for_operator()?,
            PipelineStage::Tomography => {
                self.tomography()?;
            }
            PipelineStage::GenerateModel => {
                self.generate_model()?;
            }
            PipelineStage::BurnTumour => {
                self.burn(false, None)?;
            }
        }
        Ok(())
    }
}

/// Whether a bench fault sits anywhere in the error chain
fn needs_operator(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<lasertrace_core::Error>()
            .is_some_and(|e| e.is_safety_abort() && !e.is_cancelled())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_from_middle() {
        assert_eq!(
            PipelineStage::Tomography.chain_from(),
            &[
                PipelineStage::Tomography,
                PipelineStage::GenerateModel,
                PipelineStage::BurnTumour
            ]
        );
        assert_eq!(PipelineStage::Calibrate.chain_from().len(), 5);
        assert_eq!(PipelineStage::BurnTumour.chain_from(), &[PipelineStage::BurnTumour]);
    }

    #[test]
    fn test_bench_faults_need_operator_through_context() {
        let fault: anyhow::Error = lasertrace_core::Error::from(lasertrace_core::ActuationError::Timeout {
            device: "stage".to_string(),
            timeout_ms: 10,
        })
        .into();
        assert!(needs_operator(&fault.context("burn session aborted")));

        let plain = anyhow::Error::from(lasertrace_core::Error::other("no command"));
        assert!(!needs_operator(&plain.context("reconstruction")));

        let cancelled = anyhow::Error::from(lasertrace_core::Error::Cancelled);
        assert!(!needs_operator(&cancelled));
    }

    #[test]
    fn test_generate_model_requires_command() {
        let pipeline = Pipeline::new(
            Config::default(),
            true,
            CancelFlag::new(),
            Box::new(LoggingOperator),
        );
        let err = pipeline.generate_model().unwrap_err();
        assert!(err.to_string().contains("reconstruction command"));
    }
}
