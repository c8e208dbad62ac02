//! Real-ESRGAN image upscaling: the pieces behind the desktop app.
//!
//! - [`orchestrator`] turns an input file into an upscaled output file
//! - [`runner`] runs that off the UI thread, one job at a time
//! - [`session`] is the state the window renders

pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod runner;
pub mod save;
pub mod session;

pub use config::UpscalerConfig;
pub use engine::{ModelLoader, OnnxLoader, SuperResolution};
pub use error::UpscaleError;
pub use job::{InputImage, ScaleFactor, UpscaleJob};
pub use orchestrator::{Milestone, Upscaler};
pub use runner::{JobEvent, JobHandle, JobRunner};
pub use session::{DropOutcome, DropZone, Phase, Session};
