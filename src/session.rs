//! What the window shows, as one explicit record.
//!
//! The UI never mutates paths directly; it feeds user actions and job events
//! into [`Session`] and renders whatever phase comes out.

use std::path::{Path, PathBuf};

use crate::error::{Result, UpscaleError};
use crate::job::{is_image_file, InputImage, ScaleFactor, UpscaleJob};
use crate::runner::JobEvent;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loaded {
        input: InputImage,
    },
    Processing {
        input: InputImage,
        job: UpscaleJob,
        progress: u8,
    },
    Completed {
        input: InputImage,
        output: PathBuf,
    },
    Failed {
        input: InputImage,
        message: String,
    },
}

#[derive(Debug, Default)]
pub struct Session {
    phase: Phase,
    scale: ScaleFactor,
}

impl Session {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn scale(&self) -> ScaleFactor {
        self.scale
    }

    pub fn set_scale(&mut self, scale: ScaleFactor) {
        self.scale = scale;
    }

    pub fn input(&self) -> Option<&InputImage> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Loaded { input }
            | Phase::Processing { input, .. }
            | Phase::Completed { input, .. }
            | Phase::Failed { input, .. } => Some(input),
        }
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.phase {
            Phase::Completed { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match &self.phase {
            Phase::Processing { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.phase, Phase::Processing { .. })
    }

    pub fn can_process(&self) -> bool {
        matches!(
            self.phase,
            Phase::Loaded { .. } | Phase::Completed { .. } | Phase::Failed { .. }
        )
    }

    pub fn can_save(&self) -> bool {
        matches!(self.phase, Phase::Completed { .. })
    }

    /// Replaces the current input. Refused while a job is running so its
    /// result cannot land on the wrong image.
    pub fn select_input(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        if self.is_processing() {
            return Err(UpscaleError::Busy);
        }
        let input = InputImage::new(path)?;
        self.phase = Phase::Loaded { input };
        Ok(())
    }

    /// Moves to `Processing` and returns the job to run, if processing is
    /// currently allowed.
    pub fn begin(&mut self) -> Option<UpscaleJob> {
        if !self.can_process() {
            return None;
        }
        let input = self.input()?.clone();
        let job = UpscaleJob::new(&input, self.scale);
        self.phase = Phase::Processing {
            input,
            job: job.clone(),
            progress: 0,
        };
        Some(job)
    }

    /// Applies a job event. Returns false when there is no running job to
    /// apply it to.
    pub fn apply(&mut self, event: JobEvent) -> bool {
        let Phase::Processing {
            input, progress, ..
        } = &mut self.phase
        else {
            return false;
        };

        match event {
            JobEvent::Progress(p) => {
                *progress = (*progress).max(p.min(100));
            }
            JobEvent::Finished(output) => {
                let input = input.clone();
                self.phase = Phase::Completed { input, output };
            }
            JobEvent::Failed(message) => {
                let input = input.clone();
                self.phase = Phase::Failed { input, message };
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Accepted(PathBuf),
    Rejected(String),
}

/// Tracks one drag gesture so that only single-file drops get through.
///
/// The window reports one hover event per file and then one drop event per
/// file, so a gesture is over once as many drops as hovers have been seen.
#[derive(Debug, Default)]
pub struct DropZone {
    hovered: Vec<PathBuf>,
    dropped: usize,
}

impl DropZone {
    pub fn hover(&mut self, path: PathBuf) {
        self.hovered.push(path);
    }

    pub fn leave(&mut self) {
        self.hovered.clear();
        self.dropped = 0;
    }

    pub fn is_hovered(&self) -> bool {
        !self.hovered.is_empty()
    }

    /// True when exactly one supported image is being dragged over the window.
    pub fn is_acceptable(&self) -> bool {
        matches!(self.hovered.as_slice(), [path] if is_image_file(path))
    }

    /// `None` for the trailing drops of a multi-file gesture that was
    /// already rejected.
    pub fn drop_file(&mut self, path: PathBuf) -> Option<DropOutcome> {
        let count = self.hovered.len();

        if count > 1 {
            self.dropped += 1;
            let first = self.dropped == 1;
            if self.dropped >= count {
                self.leave();
            }
            return first.then(|| {
                DropOutcome::Rejected(format!("Drop one image at a time ({} files dropped)", count))
            });
        }

        self.leave();
        if is_image_file(&path) {
            Some(DropOutcome::Accepted(path))
        } else {
            Some(DropOutcome::Rejected(format!(
                "Unsupported file type: {}",
                path.display()
            )))
        }
    }
}
