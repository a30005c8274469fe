use crate::foundation::{Result, TxId, WalletError};
use crate::infrastructure::keykeeper::{execute, KeeperExecutor, KeeperRequest, KeeperResponse, KeyKeeper, SubmitOutcome};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Single-fire wake primitive bridging the worker back to the reactor.
///
/// Posts coalesce: many completions may arrive behind one wake.
pub struct WakeEvent {
    fired: Mutex<bool>,
    cv: Condvar,
}

impl WakeEvent {
    pub fn new() -> Self {
        Self { fired: Mutex::new(false), cv: Condvar::new() }
    }

    pub fn post(&self) {
        if let Ok(mut fired) = self.fired.lock() {
            *fired = true;
            self.cv.notify_one();
        }
    }

    /// Clears the flag and reports whether it was set.
    pub fn take(&self) -> bool {
        match self.fired.lock() {
            Ok(mut fired) => std::mem::take(&mut *fired),
            Err(_) => false,
        }
    }

    /// Blocks until posted or the timeout elapses; clears the flag.
    pub fn wait(&self, timeout: Duration) -> bool {
        let Ok(mut fired) = self.fired.lock() else {
            return false;
        };
        if !*fired {
            let (guard, _) = match self.cv.wait_timeout(fired, timeout) {
                Ok(res) => res,
                Err(_) => return false,
            };
            fired = guard;
        }
        std::mem::take(&mut *fired)
    }
}

impl Default for WakeEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// A finished keeper invocation, tagged with the record that asked for it.
pub struct KeeperCompletion {
    pub tx_id: TxId,
    pub result: Result<KeeperResponse>,
}

struct Task {
    tx_id: TxId,
    request: KeeperRequest,
}

struct WorkerState {
    queue: VecDeque<Task>,
    running: bool,
}

/// Serialises keeper requests onto a worker thread.
///
/// Requests are consumed in FIFO order under a mutex+condvar; completions are
/// appended to a shared list and announced through the coalescing
/// `WakeEvent`. The worker never touches driver state.
pub struct ThreadedKeyKeeper {
    state: Arc<(Mutex<WorkerState>, Condvar)>,
    completions: Arc<Mutex<Vec<KeeperCompletion>>>,
    wake: Arc<WakeEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedKeyKeeper {
    pub fn new(keeper: Arc<dyn KeyKeeper>, wake: Arc<WakeEvent>) -> Self {
        let state = Arc::new((Mutex::new(WorkerState { queue: VecDeque::new(), running: true }), Condvar::new()));
        let completions: Arc<Mutex<Vec<KeeperCompletion>>> = Arc::new(Mutex::new(Vec::new()));

        let worker_state = Arc::clone(&state);
        let worker_completions = Arc::clone(&completions);
        let worker_wake = Arc::clone(&wake);
        let worker = std::thread::spawn(move || {
            let (lock, cv) = &*worker_state;
            loop {
                let task = {
                    let mut guard = match lock.lock() {
                        Ok(guard) => guard,
                        Err(_) => return,
                    };
                    loop {
                        if !guard.running {
                            return;
                        }
                        if let Some(task) = guard.queue.pop_front() {
                            break task;
                        }
                        guard = match cv.wait(guard) {
                            Ok(guard) => guard,
                            Err(_) => return,
                        };
                    }
                };

                let result = execute(keeper.as_ref(), task.request);
                if let Ok(mut done) = worker_completions.lock() {
                    done.push(KeeperCompletion { tx_id: task.tx_id, result });
                }
                worker_wake.post();
            }
        });

        Self { state, completions, wake, worker: Some(worker) }
    }

    pub fn wake_event(&self) -> Arc<WakeEvent> {
        Arc::clone(&self.wake)
    }

    /// Drains finished invocations; one wake may cover many of them.
    pub fn drain_completions(&self) -> Vec<KeeperCompletion> {
        match self.completions.lock() {
            Ok(mut done) => std::mem::take(&mut *done),
            Err(_) => Vec::new(),
        }
    }
}

impl KeeperExecutor for ThreadedKeyKeeper {
    fn submit(&self, tx_id: TxId, request: KeeperRequest) -> Result<SubmitOutcome> {
        let (lock, cv) = &*self.state;
        let mut guard = lock.lock().map_err(|_| WalletError::StorageError {
            operation: "keeper queue".to_string(),
            details: "lock poisoned".to_string(),
        })?;
        debug!("queueing keeper request txo={} queue_len={}", tx_id, guard.queue.len());
        guard.queue.push_back(Task { tx_id, request });
        cv.notify_one();
        Ok(SubmitOutcome::Queued)
    }
}

impl Drop for ThreadedKeyKeeper {
    fn drop(&mut self) {
        let (lock, cv) = &*self.state;
        if let Ok(mut guard) = lock.lock() {
            guard.running = false;
            cv.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
