//! Background generation worker
//!
//! An editor re-generates on every keystroke. The worker owns one dedicated
//! thread and a latest-only queue keyed by source id: submitting a newer
//! request for a key replaces the queued one, so only the most recent text of
//! each source is ever generated. A request that is already running is not
//! interrupted.
//!
//! # Shutdown
//!
//! Dropping the worker (or calling [`GenerationWorker::shutdown`]) stops the
//! thread after the running request. Queued requests are discarded without
//! calling their callbacks.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use indexmap::IndexMap;

use crate::config::Config;
use crate::diagram::{generate, Diagram, GenerationFailure};
use crate::record::Record;

/// Completion callback, called on the worker thread
pub type Callback = Box<dyn FnOnce(Result<Diagram, GenerationFailure>) + Send + 'static>;

struct Request {
    records: Vec<Record>,
    config: Config,
    callback: Callback,
}

#[derive(Default)]
struct Queue {
    requests: IndexMap<String, Request>,
    shutdown: bool,
}

type Shared = Arc<(Mutex<Queue>, Condvar)>;

fn lock(shared: &Shared) -> MutexGuard<'_, Queue> {
    shared.0.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct GenerationWorker {
    shared: Shared,
    handle: Option<JoinHandle<()>>,
}

impl GenerationWorker {
    /// Start the worker thread
    pub fn spawn() -> io::Result<Self> {
        let shared: Shared = Arc::new((Mutex::new(Queue::default()), Condvar::new()));
        let queue = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("seqgen-worker".into())
            .spawn(move || work_loop(queue))?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Queue a generation for `key`. Returns `false` once the worker is shut down.
    pub fn submit<F>(&self, key: impl Into<String>, records: Vec<Record>, config: Config, callback: F) -> bool
    where
        F: FnOnce(Result<Diagram, GenerationFailure>) + Send + 'static,
    {
        let key = key.into();
        let mut queue = lock(&self.shared);
        if queue.shutdown {
            return false;
        }
        let request = Request {
            records,
            config,
            callback: Box::new(callback),
        };
        if queue.requests.insert(key.clone(), request).is_some() {
            tracing::warn!(key = %key, "superseded queued generation request");
        }
        drop(queue);
        self.shared.1.notify_one();
        true
    }

    /// Number of requests waiting to run
    pub fn pending(&self) -> usize {
        lock(&self.shared).requests.len()
    }

    /// Stop the thread and wait for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        lock(&self.shared).shutdown = true;
        self.shared.1.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn work_loop(shared: Shared) {
    loop {
        let (key, request) = {
            let mut queue = lock(&shared);
            loop {
                if queue.shutdown {
                    let dropped = queue.requests.len();
                    if dropped > 0 {
                        tracing::debug!(dropped, "worker stopped with queued requests");
                    }
                    return;
                }
                if let Some(entry) = queue.requests.shift_remove_index(0) {
                    break entry;
                }
                queue = shared.1.wait(queue).unwrap_or_else(PoisonError::into_inner);
            }
        };

        tracing::debug!(key = %key, records = request.records.len(), "generating");
        let result = generate(&request.records, &request.config);
        (request.callback)(result);
    }
}
