#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Scaffold model engine: parameterised finite-element scaffolds with
//! annotation, node editing, refinement and deletion.
//!
//! A [`model::ScaffoldModel`] drives the pipeline: a registered
//! [`generator::ScaffoldGenerator`] turns the active parameter set into a
//! domain and fields, the edit overlay and pending transform are applied,
//! and the output is optionally refined and filtered by the deletion set.

pub mod annotation;
pub mod delete;
pub mod error;
pub mod field;
pub mod generator;
pub mod geom;
pub mod mesh;
pub mod model;
pub mod overlay;
pub mod params;
pub mod refine;
pub mod smooth;

pub use error::{ScaffoldError, ScaffoldResult};
pub use generator::{GeneratorRegistry, ScaffoldGenerator};
pub use model::{EngineOptions, ModelSettings, ModelSnapshot, OutputModel, ScaffoldModel};

cfg_if::cfg_if! {
    if #[cfg(feature = "debug_logs")] {
        use flexi_logger::{Logger, LoggerHandle};
        use once_cell::sync::OnceCell;

        static LOGGER: OnceCell<LoggerHandle> = OnceCell::new();

        /// Starts stderr logging at `level` (a `log` level or flexi_logger spec
        /// such as `"debug"` or `"info, scaffold_engine::refine=debug"`).
        /// Later calls are no-ops.
        pub fn init_logger(level: &str) -> Result<(), String> {
            LOGGER
                .get_or_try_init(|| {
                    Logger::try_with_str(level)
                        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
                        .log_to_stderr()
                        .format(flexi_logger::detailed_format)
                        .start()
                        .map_err(|err| format!("failed to start logger: {err}"))
                })
                .map(|_| ())
        }
    } else {
        /// Logging is compiled out without the `debug_logs` feature.
        pub fn init_logger(_level: &str) -> Result<(), String> {
            Ok(())
        }
    }
}
