//! Highlighting client
//!
//! The embedder-facing half of the subsystem. Owns the parsing engine
//! thread, correlates request/reply pairs, debounces reset bursts, and
//! surfaces results as [`HighlightEvent`]s. All tree-sitter state stays
//! on the engine side; the client only ever sees protocol messages.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::engine::ParsingEngine;
use crate::highlights::SyntaxHighlights;
use crate::loader;
use crate::protocol::{Edit, EngineReply, EngineRequest, FiletypeParserDescriptor, PerformanceStats};
use crate::queue::TaskQueue;

/// Default bound on blocking round trips; `with_init_timeout` overrides it
/// for the initialization handshake.
const ROUND_TRIP_TIMEOUT: Duration = Duration::from_millis(10_000);
/// How long `remove_buffer` waits for the engine to confirm disposal
const DISPOSE_TIMEOUT: Duration = Duration::from_millis(3_000);
/// Quiet period before a burst of resets is flushed to the engine
const RESET_DEBOUNCE: Duration = Duration::from_millis(10);

/// Buffers of this filetype never get a parser and never produce
/// "no parser" warnings.
pub const PLAINTEXT_FILETYPE: &str = "plaintext";

/// Whether a buffer has a working parser behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserAvailability {
    /// Initialization requested, engine has not answered yet
    Pending,
    Available,
    Unavailable,
}

/// Asynchronous notifications surfaced to the embedder.
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightEvent {
    HighlightsUpdated {
        buffer_id: u64,
        highlights: SyntaxHighlights,
    },
    ParserState {
        buffer_id: u64,
        availability: ParserAvailability,
    },
    Warning {
        buffer_id: u64,
        message: String,
    },
    Error {
        buffer_id: u64,
        message: String,
    },
    BufferDisposed {
        buffer_id: u64,
    },
}

#[derive(Debug, PartialEq)]
enum InitState {
    Idle,
    InFlight,
    Done,
}

struct BufferState {
    version: u64,
    content: String,
    filetype: String,
    availability: ParserAvailability,
    /// Bumped on every reset; a debounce sleeper only flushes when the
    /// generation it captured is still current.
    debounce_generation: u64,
    highlights: SyntaxHighlights,
}

struct Inner {
    request_tx: Mutex<Sender<EngineRequest>>,
    events_tx: Mutex<Sender<HighlightEvent>>,
    /// Round-trip waiters keyed by message id
    pending: Mutex<HashMap<u64, SyncSender<EngineReply>>>,
    /// One-shot highlight waiters keyed by buffer id
    oneshot_highlights: Mutex<HashMap<u64, SyncSender<SyntaxHighlights>>>,
    /// Disposal waiters keyed by buffer id
    disposals: Mutex<HashMap<u64, SyncSender<()>>>,
    buffers: Mutex<HashMap<u64, BufferState>>,
    /// Per-buffer FIFO queues feeding the engine channel
    queues: Mutex<HashMap<u64, Arc<TaskQueue<EngineRequest>>>>,
    next_message_id: AtomicU64,
    /// Ids for scratch buffers created by `highlight_once`, kept far away
    /// from embedder-assigned ids
    next_scratch_buffer: AtomicU64,
    init: Mutex<InitState>,
    init_cv: Condvar,
    init_reply: Mutex<Option<SyncSender<Option<String>>>>,
}

impl Inner {
    fn send(&self, request: EngineRequest) -> Result<(), String> {
        self.request_tx
            .lock()
            .unwrap()
            .send(request)
            .map_err(|_| "parsing engine is gone".to_string())
    }

    fn next_message_id(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn emit(&self, event: HighlightEvent) {
        if self.events_tx.lock().unwrap().send(event).is_err() {
            tracing::debug!("Event receiver gone");
        }
    }

    /// Blocking request/reply round trip correlated by message id.
    fn round_trip(
        &self,
        message_id: u64,
        request: EngineRequest,
        timeout: Duration,
    ) -> Result<EngineReply, String> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.pending.lock().unwrap().insert(message_id, tx);

        if let Err(e) = self.send(request) {
            self.pending.lock().unwrap().remove(&message_id);
            return Err(e);
        }

        match rx.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(_) => {
                self.pending.lock().unwrap().remove(&message_id);
                Err("timed out waiting for parsing engine".to_string())
            }
        }
    }
}

/// Handle to the highlighting subsystem.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct HighlightClient {
    inner: Arc<Inner>,
    events: Mutex<Receiver<HighlightEvent>>,
    engine_thread: Mutex<Option<JoinHandle<()>>>,
    dispatch_thread: Mutex<Option<JoinHandle<()>>>,
    init_timeout: Duration,
}

impl HighlightClient {
    /// Spawn the parsing engine and reply dispatch threads. The engine is
    /// not usable until [`initialize`](Self::initialize) succeeds.
    pub fn new() -> Self {
        Self::with_init_timeout(ROUND_TRIP_TIMEOUT)
    }

    /// Like [`new`](Self::new), but with a caller-chosen bound on how long
    /// [`initialize`](Self::initialize) waits for the engine handshake.
    pub fn with_init_timeout(init_timeout: Duration) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();

        let inner = Arc::new(Inner {
            request_tx: Mutex::new(request_tx),
            events_tx: Mutex::new(events_tx),
            pending: Mutex::new(HashMap::new()),
            oneshot_highlights: Mutex::new(HashMap::new()),
            disposals: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            next_message_id: AtomicU64::new(1),
            next_scratch_buffer: AtomicU64::new(1 << 63),
            init: Mutex::new(InitState::Idle),
            init_cv: Condvar::new(),
            init_reply: Mutex::new(None),
        });

        let engine_thread = std::thread::Builder::new()
            .name("treelight-engine".to_string())
            .spawn(move || ParsingEngine::new(reply_tx).run(request_rx))
            .ok();

        let dispatch_inner = Arc::clone(&inner);
        let dispatch_thread = std::thread::Builder::new()
            .name("treelight-dispatch".to_string())
            .spawn(move || dispatch_loop(dispatch_inner, reply_rx))
            .ok();

        Self {
            inner,
            events: Mutex::new(events_rx),
            engine_thread: Mutex::new(engine_thread),
            dispatch_thread: Mutex::new(dispatch_thread),
            init_timeout,
        }
    }

    /// Initialize the engine with a data path for the resource cache.
    ///
    /// Blocking, idempotent, and safe to call from multiple threads at
    /// once: one caller drives the handshake, the rest wait for its
    /// outcome. A failed attempt leaves the client reinitializable.
    pub fn initialize(&self, data_path: Option<PathBuf>) -> Result<(), String> {
        let deadline = Instant::now() + self.init_timeout;
        let mut state = self.inner.init.lock().unwrap();
        loop {
            match *state {
                InitState::Done => return Ok(()),
                InitState::Idle => break,
                InitState::InFlight => {
                    let remaining = deadline
                        .checked_duration_since(Instant::now())
                        .ok_or_else(|| "initialization timed out".to_string())?;
                    let (guard, _) = self
                        .inner
                        .init_cv
                        .wait_timeout(state, remaining)
                        .unwrap();
                    state = guard;
                }
            }
        }
        *state = InitState::InFlight;
        drop(state);

        let result = self.drive_init(data_path);

        let mut state = self.inner.init.lock().unwrap();
        *state = if result.is_ok() {
            InitState::Done
        } else {
            InitState::Idle
        };
        self.inner.init_cv.notify_all();
        result
    }

    fn drive_init(&self, data_path: Option<PathBuf>) -> Result<(), String> {
        let data_path = match data_path.or_else(crate::data_paths::default_data_dir) {
            Some(path) => path,
            None => return Err("could not determine a data directory".to_string()),
        };

        let (tx, rx) = mpsc::sync_channel(1);
        *self.inner.init_reply.lock().unwrap() = Some(tx);

        self.inner.send(EngineRequest::Init { data_path })?;

        match rx.recv_timeout(self.init_timeout) {
            Ok(None) => {}
            Ok(Some(error)) => return Err(error),
            Err(_) => {
                self.inner.init_reply.lock().unwrap().take();
                return Err("timed out waiting for engine initialization".to_string());
            }
        }

        for descriptor in loader::default_descriptors() {
            self.inner
                .send(EngineRequest::AddFiletypeParser { descriptor })?;
        }
        Ok(())
    }

    /// Register (or replace) the parser mapping for a filetype.
    pub fn add_filetype_parser(&self, descriptor: FiletypeParserDescriptor) -> Result<(), String> {
        self.inner.send(EngineRequest::AddFiletypeParser { descriptor })
    }

    /// Resolve a filetype's grammar and query ahead of the first buffer,
    /// returning whether a parser is available.
    pub fn preload_parser(&self, filetype: &str) -> Result<bool, String> {
        let message_id = self.inner.next_message_id();
        let reply = self.inner.round_trip(
            message_id,
            EngineRequest::PreloadParser {
                filetype: filetype.to_string(),
                message_id,
            },
            ROUND_TRIP_TIMEOUT,
        )?;
        match reply {
            EngineReply::PreloadDone { has_parser, .. } => Ok(has_parser),
            other => Err(format!("unexpected preload reply: {:?}", other)),
        }
    }

    /// Start tracking a buffer, setting its parser up on the engine.
    ///
    /// Blocks until the engine answers and returns whether a parser is
    /// available for the filetype. The initial highlight pass still
    /// arrives asynchronously as a [`HighlightEvent`]. A duplicate buffer
    /// id is rejected without touching the engine.
    pub fn initialize_buffer(
        &self,
        buffer_id: u64,
        version: u64,
        content: String,
        filetype: impl Into<String>,
    ) -> Result<bool, String> {
        let filetype = filetype.into();
        {
            let mut buffers = self.inner.buffers.lock().unwrap();
            if buffers.contains_key(&buffer_id) {
                return Err(format!("buffer {} already exists", buffer_id));
            }
            buffers.insert(
                buffer_id,
                BufferState {
                    version,
                    content: content.clone(),
                    filetype: filetype.clone(),
                    availability: ParserAvailability::Pending,
                    debounce_generation: 0,
                    highlights: SyntaxHighlights::new(version),
                },
            );
        }

        let message_id = self.inner.next_message_id();
        let (tx, rx) = mpsc::sync_channel(1);
        self.inner.pending.lock().unwrap().insert(message_id, tx);

        let queue = self.buffer_queue(buffer_id);
        queue.push(EngineRequest::InitializeParser {
            buffer_id,
            version,
            content,
            filetype,
            message_id,
        });

        match rx.recv_timeout(ROUND_TRIP_TIMEOUT) {
            Ok(EngineReply::ParserInit { has_parser, .. }) => Ok(has_parser),
            Ok(other) => Err(format!("unexpected initialization reply: {:?}", other)),
            Err(_) => {
                self.inner.pending.lock().unwrap().remove(&message_id);
                Err("timed out waiting for parser initialization".to_string())
            }
        }
    }

    fn buffer_queue(&self, buffer_id: u64) -> Arc<TaskQueue<EngineRequest>> {
        let mut queues = self.inner.queues.lock().unwrap();
        queues
            .entry(buffer_id)
            .or_insert_with(|| {
                let inner = Arc::clone(&self.inner);
                Arc::new(TaskQueue::new(format!("buffer-{}", buffer_id), move |req| {
                    inner.send(req)
                }))
            })
            .clone()
    }

    /// Record a burst of edits against a buffer and forward it to the
    /// engine right away on the buffer's FIFO queue. Non-blocking; the
    /// updated highlights arrive as a [`HighlightEvent`].
    pub fn handle_edits(&self, buffer_id: u64, version: u64, content: String, edits: Vec<Edit>) {
        {
            let mut buffers = self.inner.buffers.lock().unwrap();
            let Some(state) = buffers.get_mut(&buffer_id) else {
                tracing::warn!("Edits for unknown buffer {}", buffer_id);
                return;
            };
            // Parserless buffers stay tracked but never reach the engine
            if state.availability == ParserAvailability::Unavailable {
                return;
            }
            state.version = version;
            state.content = content.clone();
        }

        self.buffer_queue(buffer_id).push(EngineRequest::HandleEdits {
            buffer_id,
            version,
            content,
            edits,
        });
    }

    /// Throw away incremental state and reparse the buffer from scratch.
    ///
    /// Queued edit requests for the buffer are dropped. Resets are
    /// debounced: a burst within the quiet interval collapses into one
    /// reparse of the latest content.
    pub fn reset_buffer(&self, buffer_id: u64, version: u64, content: String) {
        let generation = {
            let mut buffers = self.inner.buffers.lock().unwrap();
            let Some(state) = buffers.get_mut(&buffer_id) else {
                tracing::warn!("Reset for unknown buffer {}", buffer_id);
                return;
            };
            if state.availability == ParserAvailability::Unavailable {
                drop(buffers);
                self.inner.emit(HighlightEvent::Error {
                    buffer_id,
                    message: format!("cannot reset buffer {} without a parser", buffer_id),
                });
                return;
            }
            state.version = version;
            state.content = content;
            state.debounce_generation += 1;
            state.debounce_generation
        };

        if let Some(queue) = self.inner.queues.lock().unwrap().get(&buffer_id) {
            queue.clear();
        }

        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("treelight-debounce".to_string())
            .spawn(move || {
                std::thread::sleep(RESET_DEBOUNCE);
                let request = {
                    let buffers = inner.buffers.lock().unwrap();
                    let Some(state) = buffers.get(&buffer_id) else {
                        return;
                    };
                    if state.debounce_generation != generation {
                        return;
                    }
                    EngineRequest::ResetBuffer {
                        buffer_id,
                        version: state.version,
                        content: state.content.clone(),
                    }
                };
                let queue = inner.queues.lock().unwrap().get(&buffer_id).cloned();
                if let Some(queue) = queue {
                    queue.push(request);
                }
            });
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn debounce thread: {}", e);
        }
    }

    /// Stop tracking a buffer and free its parser state on the engine.
    ///
    /// Blocks until the engine confirms or the timeout elapses; returns
    /// false when no confirmation arrived, and drops the waiter so a
    /// confirmation that never comes cannot pile up. Removing an unknown
    /// buffer is a no-op returning true.
    pub fn remove_buffer(&self, buffer_id: u64) -> bool {
        if self.inner.buffers.lock().unwrap().remove(&buffer_id).is_none() {
            return true;
        }
        // Dropping the queue discards pending requests and joins its worker
        self.inner.queues.lock().unwrap().remove(&buffer_id);

        let (tx, rx) = mpsc::sync_channel(1);
        self.inner.disposals.lock().unwrap().insert(buffer_id, tx);

        let disposed = self
            .inner
            .send(EngineRequest::DisposeBuffer { buffer_id })
            .is_ok()
            && rx.recv_timeout(DISPOSE_TIMEOUT).is_ok();
        if !disposed {
            tracing::warn!("No disposal confirmation for buffer {}", buffer_id);
            self.inner.disposals.lock().unwrap().remove(&buffer_id);
        }
        disposed
    }

    /// Rolling parse/query timing averages from the engine.
    pub fn get_performance(&self) -> Result<PerformanceStats, String> {
        let message_id = self.inner.next_message_id();
        let reply = self.inner.round_trip(
            message_id,
            EngineRequest::GetPerformance { message_id },
            ROUND_TRIP_TIMEOUT,
        )?;
        match reply {
            EngineReply::Performance { stats, .. } => Ok(stats),
            other => Err(format!("unexpected performance reply: {:?}", other)),
        }
    }

    /// Point the engine's resource cache at a different directory.
    pub fn set_data_path(&self, path: PathBuf) -> Result<(), String> {
        self.inner.send(EngineRequest::SetDataPath { path })
    }

    /// Highlight a piece of text once, without tracking a buffer.
    /// Blocking convenience used by the CLI.
    pub fn highlight_once(&self, content: &str, filetype: &str) -> Result<SyntaxHighlights, String> {
        let buffer_id = self.inner.next_scratch_buffer.fetch_add(1, Ordering::Relaxed);
        let message_id = self.inner.next_message_id();

        let (highlights_tx, highlights_rx) = mpsc::sync_channel(1);
        self.inner
            .oneshot_highlights
            .lock()
            .unwrap()
            .insert(buffer_id, highlights_tx);

        let cleanup = || {
            self.inner.oneshot_highlights.lock().unwrap().remove(&buffer_id);
        };

        let reply = match self.inner.round_trip(
            message_id,
            EngineRequest::InitializeParser {
                buffer_id,
                version: 1,
                content: content.to_string(),
                filetype: filetype.to_string(),
                message_id,
            },
            ROUND_TRIP_TIMEOUT,
        ) {
            Ok(reply) => reply,
            Err(e) => {
                cleanup();
                return Err(e);
            }
        };

        match reply {
            EngineReply::ParserInit {
                has_parser: true, ..
            } => {}
            EngineReply::ParserInit { warning, error, .. } => {
                cleanup();
                return Err(warning
                    .or(error)
                    .unwrap_or_else(|| format!("no parser for filetype {}", filetype)));
            }
            other => {
                cleanup();
                return Err(format!("unexpected initialization reply: {:?}", other));
            }
        }

        let result = highlights_rx.recv_timeout(ROUND_TRIP_TIMEOUT);
        cleanup();
        // The scratch buffer exists engine-side once ParserInit succeeded;
        // free it on every exit path.
        let _ = self.inner.send(EngineRequest::DisposeBuffer { buffer_id });
        result.map_err(|_| "timed out waiting for highlights".to_string())
    }

    /// Latest accepted highlights for a buffer.
    pub fn buffer_highlights(&self, buffer_id: u64) -> Option<SyntaxHighlights> {
        self.inner
            .buffers
            .lock()
            .unwrap()
            .get(&buffer_id)
            .map(|state| state.highlights.clone())
    }

    /// Current parser availability for a buffer.
    pub fn parser_availability(&self, buffer_id: u64) -> Option<ParserAvailability> {
        self.inner
            .buffers
            .lock()
            .unwrap()
            .get(&buffer_id)
            .map(|state| state.availability)
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<HighlightEvent> {
        self.events.lock().unwrap().recv_timeout(timeout).ok()
    }

    /// Non-blocking event poll.
    pub fn try_recv_event(&self) -> Option<HighlightEvent> {
        self.events.lock().unwrap().try_recv().ok()
    }

    /// Shut the engine down and join its threads. Idempotent; also runs on
    /// drop.
    pub fn destroy(&self) {
        let _ = self.inner.send(EngineRequest::Shutdown);
        // Buffer queues hold engine senders; drop them first so the
        // request channel actually closes.
        self.inner.queues.lock().unwrap().clear();
        self.inner.buffers.lock().unwrap().clear();
        self.inner.pending.lock().unwrap().clear();
        self.inner.disposals.lock().unwrap().clear();
        self.inner.oneshot_highlights.lock().unwrap().clear();

        if let Some(handle) = self.engine_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatch_thread.lock().unwrap().take() {
            let _ = handle.join();
        }

        let mut state = self.inner.init.lock().unwrap();
        *state = InitState::Idle;
        self.inner.init_cv.notify_all();
    }
}

impl Default for HighlightClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HighlightClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Routes engine replies to round-trip waiters, buffer state, and the
/// embedder event channel. Runs until the engine's reply sender drops.
fn dispatch_loop(inner: Arc<Inner>, reply_rx: Receiver<EngineReply>) {
    while let Ok(reply) = reply_rx.recv() {
        match reply {
            EngineReply::InitDone { error } => {
                if let Some(waiter) = inner.init_reply.lock().unwrap().take() {
                    let _ = waiter.send(error);
                }
            }

            EngineReply::ParserInit {
                buffer_id,
                message_id,
                has_parser,
                warning,
                error,
            } => {
                let availability = if has_parser {
                    ParserAvailability::Available
                } else {
                    ParserAvailability::Unavailable
                };
                let mut tracked = false;
                let mut suppress_warning = false;
                {
                    let mut buffers = inner.buffers.lock().unwrap();
                    if let Some(state) = buffers.get_mut(&buffer_id) {
                        state.availability = availability;
                        tracked = true;
                        suppress_warning = state.filetype == PLAINTEXT_FILETYPE;
                    }
                }

                if let Some(waiter) = inner.pending.lock().unwrap().remove(&message_id) {
                    let _ = waiter.send(EngineReply::ParserInit {
                        buffer_id,
                        message_id,
                        has_parser,
                        warning: warning.clone(),
                        error: error.clone(),
                    });
                }

                if tracked {
                    inner.emit(HighlightEvent::ParserState {
                        buffer_id,
                        availability,
                    });
                    if let Some(warning) = warning {
                        if suppress_warning {
                            tracing::debug!("Suppressed warning for buffer {}: {}", buffer_id, warning);
                        } else {
                            tracing::warn!("{}", warning);
                            inner.emit(HighlightEvent::Warning {
                                buffer_id,
                                message: warning,
                            });
                        }
                    }
                    if let Some(error) = error {
                        tracing::error!("Parser init failed for buffer {}: {}", buffer_id, error);
                        inner.emit(HighlightEvent::Error {
                            buffer_id,
                            message: error,
                        });
                    }
                }
            }

            EngineReply::PreloadDone { message_id, .. }
            | EngineReply::Performance { message_id, .. } => {
                if let Some(waiter) = inner.pending.lock().unwrap().remove(&message_id) {
                    let _ = waiter.send(reply);
                }
            }

            EngineReply::Highlights {
                buffer_id,
                version,
                highlights,
            } => {
                if let Some(waiter) = inner.oneshot_highlights.lock().unwrap().remove(&buffer_id) {
                    let _ = waiter.send(highlights);
                    continue;
                }

                let stale = {
                    let mut buffers = inner.buffers.lock().unwrap();
                    let Some(state) = buffers.get_mut(&buffer_id) else {
                        // Disposed while the reply was in flight
                        continue;
                    };
                    if version == state.version {
                        state.highlights = highlights.clone();
                        None
                    } else {
                        Some((state.version, state.content.clone()))
                    }
                };

                match stale {
                    None => {
                        inner.emit(HighlightEvent::HighlightsUpdated {
                            buffer_id,
                            highlights,
                        });
                    }
                    Some((current_version, content)) => {
                        // Stale results are never surfaced. The engine's
                        // incremental state may have drifted from the
                        // buffer, so resynchronize with a full reset.
                        tracing::debug!(
                            "Discarding stale highlights for buffer {} (v{}, buffer at v{})",
                            buffer_id,
                            version,
                            current_version
                        );
                        let queue = inner.queues.lock().unwrap().get(&buffer_id).cloned();
                        if let Some(queue) = queue {
                            queue.push(EngineRequest::ResetBuffer {
                                buffer_id,
                                version: current_version,
                                content,
                            });
                        }
                    }
                }
            }

            EngineReply::Warning { buffer_id, warning } => {
                tracing::warn!("Engine warning for buffer {}: {}", buffer_id, warning);
                inner.emit(HighlightEvent::Warning {
                    buffer_id,
                    message: warning,
                });
            }

            EngineReply::Error { buffer_id, error } => {
                tracing::error!("Engine error for buffer {}: {}", buffer_id, error);
                inner.emit(HighlightEvent::Error {
                    buffer_id,
                    message: error,
                });
            }

            EngineReply::BufferDisposed { buffer_id } => {
                if let Some(waiter) = inner.disposals.lock().unwrap().remove(&buffer_id) {
                    let _ = waiter.send(());
                    inner.emit(HighlightEvent::BufferDisposed { buffer_id });
                }
            }
        }
    }
    tracing::debug!("Reply dispatch exiting");
}
