//! Per-buffer FIFO task queue
//!
//! A minimal single-consumer queue backed by a worker thread. Items are
//! processed strictly in submission order, one at a time; pushing never
//! runs the processor on the caller's thread. A processor failure is
//! logged and the queue keeps draining.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

struct QueueState<T> {
    items: VecDeque<T>,
    shutdown: bool,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

/// A FIFO task queue draining on a dedicated worker thread.
pub struct TaskQueue<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    worker: Option<JoinHandle<()>>,
    name: String,
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Create a queue draining into `processor`. The name shows up in the
    /// worker thread name and log lines.
    pub fn new<F>(name: impl Into<String>, mut processor: F) -> Self
    where
        F: FnMut(T) -> Result<(), String> + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker_name = name.clone();
        let worker = std::thread::Builder::new()
            .name(format!("treelight-queue-{}", name))
            .spawn(move || loop {
                let item = {
                    let mut state = worker_shared.state.lock().unwrap();
                    loop {
                        if state.shutdown {
                            return;
                        }
                        if let Some(item) = state.items.pop_front() {
                            break item;
                        }
                        state = worker_shared.available.wait(state).unwrap();
                    }
                };

                if let Err(e) = processor(item) {
                    tracing::warn!("Queue {} processor failed: {}", worker_name, e);
                }
            })
            .expect("failed to spawn queue worker thread");

        Self {
            shared,
            worker: Some(worker),
            name,
        }
    }

    /// Append an item. Processing happens on the worker thread, never
    /// during this call.
    pub fn push(&self, item: T) {
        let mut state = self.shared.state.lock().unwrap();
        if state.shutdown {
            tracing::warn!("Queue {} push after shutdown, dropping item", self.name);
            return;
        }
        state.items.push_back(item);
        drop(state);
        self.shared.available.notify_one();
    }

    /// Drop all pending items without running them.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock().unwrap();
        let dropped = state.items.len();
        state.items.clear();
        if dropped > 0 {
            tracing::debug!("Queue {} cleared {} pending items", self.name, dropped);
        }
    }

    /// Number of items not yet handed to the processor.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().unwrap().items.len()
    }
}

impl<T: Send + 'static> Drop for TaskQueue<T> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
            state.items.clear();
        }
        self.shared.available.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
