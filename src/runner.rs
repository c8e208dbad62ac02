//! Runs one upscale job on a worker thread and streams its events back.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{Result, UpscaleError};
use crate::job::UpscaleJob;
use crate::orchestrator::Upscaler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Progress(u8),
    Finished(PathBuf),
    Failed(String),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress(_))
    }
}

/// Receiving end of a running job. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct JobHandle {
    rx: Arc<Mutex<UnboundedReceiver<JobEvent>>>,
}

impl JobHandle {
    /// `None` once the worker is gone and every event has been read.
    pub async fn next_event(self) -> Option<JobEvent> {
        self.rx.lock().await.recv().await
    }

    pub fn blocking_next(&self) -> Option<JobEvent> {
        self.rx.blocking_lock().blocking_recv()
    }
}

/// Frees the job slot when the worker is done, even if it panicked.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the single job slot. A second `start` while a job is in flight is
/// rejected with [`UpscaleError::Busy`].
#[derive(Clone)]
pub struct JobRunner {
    upscaler: Upscaler,
    busy: Arc<AtomicBool>,
}

impl JobRunner {
    pub fn new(upscaler: Upscaler) -> Self {
        Self {
            upscaler,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn start(&self, job: UpscaleJob) -> Result<JobHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected job for {}: another job is running", job.input_path.display());
            return Err(UpscaleError::Busy);
        }
        let slot = SlotGuard(self.busy.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let upscaler = self.upscaler.clone();

        thread::Builder::new()
            .name("upscale-worker".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    upscaler.upscale(&job, |milestone| {
                        let _ = tx.send(JobEvent::Progress(milestone.percent()));
                    })
                }));

                let event = match result {
                    Ok(Ok(path)) => {
                        info!("Job finished: {}", path.display());
                        JobEvent::Finished(path)
                    }
                    Ok(Err(e)) => {
                        error!("Job failed for {}: {}", job.input_path.display(), e);
                        JobEvent::Failed(format!("Error during upscaling: {}", e))
                    }
                    Err(_) => {
                        error!("Worker panicked while processing {}", job.input_path.display());
                        JobEvent::Failed("Error during upscaling: worker thread panicked".to_string())
                    }
                };

                // Release before the terminal event so the receiver can start
                // the next job as soon as it sees it.
                drop(slot);
                let _ = tx.send(event);
            })
            .map_err(|e| UpscaleError::model(format!("Failed to start worker thread: {}", e)))?;

        Ok(JobHandle {
            rx: Arc::new(Mutex::new(rx)),
        })
    }
}
