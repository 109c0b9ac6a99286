//! # LaserTrace
//!
//! Camera-guided galvo laser bench: calibrates a two-axis galvanometer
//! against a 3×3 target plate, then burns a reconstructed tumour slice by
//! slice while a rotary stage turns it between passes.
//!
//! ## Architecture
//!
//! 1. **lasertrace-core** - Coordinate types, error taxonomy, cancellation
//! 2. **lasertrace-communication** - Galvo, stage and laser drivers plus simulated devices
//! 3. **lasertrace-vision** - Frames, cameras and target detection
//! 4. **lasertrace-calibration** - Grids, feedback scans, pixel to voltage mapping
//! 5. **lasertrace-targeting** - Tumour slicing and the burn sequencer
//! 6. **lasertrace-settings** - Bench configuration
//! 7. **lasertrace** - Session wiring, stage chain and the CLI

pub mod pipeline;
pub mod session;

pub use lasertrace_calibration::CoarseSource;
pub use lasertrace_core::{CancelFlag, Error, Result};
pub use lasertrace_settings::Config;
pub use pipeline::{BurnOutcome, ConsoleOperator, LoggingOperator, Pipeline, PipelineStage};
pub use session::Session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// `RUST_LOG` overrides the INFO default. With `json` every event is written
/// as one JSON object per line.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Raise `cancel` on Ctrl-C
///
/// The signal is awaited on a dedicated thread with its own runtime; the
/// control loops only ever see the flag.
pub fn spawn_interrupt_watcher(cancel: CancelFlag) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::warn!("Interrupt received, stopping at the next safe point");
                        cancel.cancel();
                    }
                    Err(e) => tracing::warn!("Ctrl-C handling unavailable: {}", e),
                }
            });
        })
}
