//! Background merge worker

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::{debug, error, info};

use crate::error::Result;

use super::MergeEngine;

/// Requests queued before `request` starts coalescing
const QUEUE_DEPTH: usize = 4;

/// Messages accepted by the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSignal {
    Run,
    Shutdown,
}

/// A dedicated thread running merge passes for one table
///
/// Dropping the worker sends `Shutdown` and joins the thread; queued `Run`
/// signals ahead of it are still served.
pub struct MergeWorker {
    sender: Sender<MergeSignal>,
    handle: Option<JoinHandle<()>>,
}

impl MergeWorker {
    pub fn spawn(table: &str, engine: Arc<MergeEngine>) -> Result<Self> {
        let (sender, receiver) = channel::bounded(QUEUE_DEPTH);
        let handle = thread::Builder::new()
            .name(format!("lstore-merge-{}", table))
            .spawn(move || run(engine, receiver))?;
        info!(table, "merge worker started");
        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Ask for a pass. A full queue already holds pending passes, so the
    /// request is dropped. Returns false once the worker has stopped.
    pub fn request(&self) -> bool {
        match self.sender.try_send(MergeSignal::Run) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Stop the thread after it drains the queue
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.sender.send(MergeSignal::Shutdown);
        if handle.join().is_err() {
            error!("merge worker panicked");
        }
    }
}

impl Drop for MergeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(engine: Arc<MergeEngine>, receiver: Receiver<MergeSignal>) {
    for signal in receiver.iter() {
        match signal {
            MergeSignal::Run => {
                if let Err(e) = engine.merge() {
                    error!(error = %e, "background merge failed");
                }
            }
            MergeSignal::Shutdown => break,
        }
    }
    debug!("merge worker stopped");
}
