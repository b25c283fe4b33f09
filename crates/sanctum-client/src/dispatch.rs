use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use sanctum_frame::{FrameConfig, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
use sanctum_transport::VaultStream;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{translate, ClientError, Result};
use crate::lock;
use crate::wire::{WireError, WireRequest, WireResponse};

/// Configuration for the request dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Default timeout applied to calls without an explicit one.
    pub request_timeout: Duration,
    /// Maximum wire message size in bytes.
    pub max_message_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

enum Reply {
    Result(Value),
    Error(WireError),
}

struct Shared {
    pending: Mutex<HashMap<u64, mpsc::Sender<Reply>>>,
    closed: AtomicBool,
    fail_reason: Mutex<Option<String>>,
}

/// Serializes structured calls to wire envelopes and correlates responses to
/// their callers.
///
/// One receive loop owns the read half of the stream and resolves pending
/// calls by correlation id; callers block only on their own completion
/// channel. The write half is serialized behind a mutex so frames from
/// concurrent callers never interleave.
pub struct Dispatcher {
    writer: Mutex<FrameWriter<VaultStream>>,
    stream: VaultStream,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    default_timeout: Duration,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Take ownership of a connected stream and spawn the receive loop.
    pub fn new(stream: VaultStream, config: DispatchConfig) -> Result<Self> {
        let frame_config = FrameConfig {
            max_payload_size: config.max_message_size,
            read_timeout: None,
            write_timeout: None,
        };

        let reader = FrameReader::with_config_stream(stream.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream.try_clone()?, frame_config)?;

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            fail_reason: Mutex::new(None),
        });

        let receiver = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || receive_loop(reader, shared))
        };

        Ok(Self {
            writer: Mutex::new(writer),
            stream,
            shared,
            next_id: AtomicU64::new(0),
            default_timeout: config.request_timeout,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Issue a call with the default timeout.
    pub fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_with_timeout(method, params, self.default_timeout)
    }

    /// Issue a call and wait up to `timeout` for its response.
    ///
    /// A timeout removes the local bookkeeping for the call; the request
    /// itself cannot be retracted from the server. Correlation ids are
    /// monotonic and never reused within the dispatcher's lifetime.
    pub fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.pending).insert(id, tx);

        let request = WireRequest { id, method, params };
        let payload = match serde_json::to_vec(&request) {
            Ok(payload) => payload,
            Err(err) => {
                lock(&self.shared.pending).remove(&id);
                return Err(err.into());
            }
        };

        debug!(id, method, "sending request");
        if let Err(err) = lock(&self.writer).send(&payload) {
            lock(&self.shared.pending).remove(&id);
            return Err(err.into());
        }

        match rx.recv_timeout(timeout) {
            Ok(Reply::Result(value)) => Ok(value),
            Ok(Reply::Error(err)) => Err(ClientError::Vault(translate(err))),
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.shared.pending).remove(&id);
                Err(ClientError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(self.closed_error()),
        }
    }

    /// Whether the dispatcher has shut down (explicitly or by losing the
    /// connection).
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Tear down the connection and stop the receive loop. Idempotent.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Err(err) = self.stream.shutdown() {
            debug!(%err, "stream shutdown");
        }
        if let Some(handle) = lock(&self.receiver).take() {
            let _ = handle.join();
        }
        debug!("dispatcher shut down");
    }

    fn closed_error(&self) -> ClientError {
        match lock(&self.shared.fail_reason).clone() {
            Some(reason) => ClientError::Disconnected(reason),
            None => ClientError::Closed,
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn receive_loop(mut reader: FrameReader<VaultStream>, shared: Arc<Shared>) {
    let reason = loop {
        let payload = match reader.read_frame() {
            Ok(payload) => payload,
            Err(err) => break err.to_string(),
        };

        let response: WireResponse = match serde_json::from_slice(&payload) {
            Ok(response) => response,
            Err(err) => break format!("malformed response: {err}"),
        };

        let Some(id) = response.id else {
            debug!("dropping response without an id");
            continue;
        };

        let Some(tx) = lock(&shared.pending).remove(&id) else {
            debug!(id, "dropping response for unknown id");
            continue;
        };

        let reply = if let Some(err) = response.error {
            Reply::Error(err)
        } else {
            Reply::Result(
                response
                    .result
                    .unwrap_or_else(|| Value::Object(Map::new())),
            )
        };
        // The caller may have timed out and gone away; nothing to do then.
        let _ = tx.send(reply);
    };

    let already_closing = shared.closed.swap(true, Ordering::AcqRel);
    if !already_closing {
        warn!(%reason, "receive loop terminated");
        *lock(&shared.fail_reason) = Some(reason);
    }

    // Dropping the senders resolves every outstanding call.
    lock(&shared.pending).clear();
}
