use parking_lot::{Mutex, RwLock};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::channel::{Channel, ChannelId};
use super::functions::FunctionTable;
use super::protocol::{Envelope, ErrorCode, FrameCodec, RemoteError};
use crate::error::RpcError;

struct PendingCall {
    channel: ChannelId,
    reply: oneshot::Sender<Envelope>,
}

/// Dynamic set of observer channels sharing one function table.
///
/// # Concurrency
///
/// - `channels`: membership, read by every call and broadcast
/// - `pending`: outstanding directed calls keyed by correlation id
pub struct ChannelGroup {
    codec: FrameCodec,
    functions: Arc<FunctionTable>,
    channels: RwLock<Vec<(ChannelId, Arc<dyn Channel>)>>,
    pending: Mutex<HashMap<u64, PendingCall>>,
    next_channel: AtomicU64,
    next_call: AtomicU64,
    timeout: Duration,
}

impl ChannelGroup {
    pub fn new(codec: FrameCodec, functions: Arc<FunctionTable>, timeout: Duration) -> Self {
        Self {
            codec,
            functions,
            channels: RwLock::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            next_channel: AtomicU64::new(1),
            next_call: AtomicU64::new(1),
            timeout,
        }
    }

    pub fn functions(&self) -> &Arc<FunctionTable> {
        &self.functions
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Joins the group for subsequent broadcasts. Nothing earlier is replayed.
    pub fn add_channel(&self, channel: Arc<dyn Channel>) -> ChannelId {
        let id = self.next_channel.fetch_add(1, Ordering::Relaxed);
        self.channels.write().push((id, channel));
        debug!(channel = id, "observer channel added");
        id
    }

    /// Leaves the group. Calls still waiting on this channel move on.
    pub fn remove_channel(&self, id: ChannelId) -> bool {
        let removed = {
            let mut channels = self.channels.write();
            let before = channels.len();
            channels.retain(|(cid, _)| *cid != id);
            channels.len() != before
        };
        if removed {
            // dropping the reply senders wakes the waiting callers
            self.pending.lock().retain(|_, call| call.channel != id);
            debug!(channel = id, "observer channel removed");
        }
        removed
    }

    fn snapshot(&self) -> Vec<(ChannelId, Arc<dyn Channel>)> {
        self.channels.read().clone()
    }

    fn channel(&self, id: ChannelId) -> Option<Arc<dyn Channel>> {
        self.channels
            .read()
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, ch)| Arc::clone(ch))
    }

    /// Calls `method` on the first channel able to resolve it.
    ///
    /// Channels answering "no such method" are skipped. The wait on a single
    /// channel is bounded by the group timeout.
    pub async fn call(&self, method: &str, args: Vec<JsonValue>) -> Result<JsonValue, RpcError> {
        let channels = self.snapshot();
        if channels.is_empty() {
            return Err(RpcError::NoChannels);
        }

        let mut last_err = RpcError::NoSuchMethod(method.to_string());
        for (channel_id, channel) in channels {
            if !channel.is_alive() {
                continue;
            }

            let id = self.next_call.fetch_add(1, Ordering::Relaxed);
            let frame = match self.codec.encode(&Envelope::Request {
                id,
                method: method.to_string(),
                args: args.clone(),
            }) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(method, error = %e, "failed to encode rpc request");
                    return Err(RpcError::Remote {
                        method: method.to_string(),
                        message: e.to_string(),
                    });
                }
            };

            let (reply, rx) = oneshot::channel();
            self.pending.lock().insert(
                id,
                PendingCall {
                    channel: channel_id,
                    reply,
                },
            );

            if channel.post(frame).is_err() {
                self.pending.lock().remove(&id);
                trace!(channel = channel_id, method, "channel closed, trying next");
                last_err = RpcError::ChannelClosed(method.to_string());
                continue;
            }

            match tokio::time::timeout(self.timeout, rx).await {
                Ok(Ok(Envelope::Response { result, error, .. })) => match error {
                    None => return Ok(result.unwrap_or(JsonValue::Null)),
                    Some(err) if err.is_unresolved() => {
                        last_err = match err.code {
                            ErrorCode::UnregisteredNamespace => {
                                RpcError::UnregisteredNamespace(err.message)
                            }
                            _ => RpcError::NoSuchMethod(method.to_string()),
                        };
                    }
                    Some(err) => {
                        return Err(RpcError::Remote {
                            method: method.to_string(),
                            message: err.message,
                        })
                    }
                },
                Ok(Ok(_)) => {}
                Ok(Err(_)) => {
                    last_err = RpcError::ChannelClosed(method.to_string());
                }
                Err(_) => {
                    self.pending.lock().remove(&id);
                    warn!(method, timeout = ?self.timeout, "rpc call timed out");
                    return Err(RpcError::Timeout {
                        method: method.to_string(),
                        timeout: self.timeout,
                    });
                }
            }
        }

        Err(last_err)
    }

    /// Fire-and-forget event to every member. Returns how many accepted it.
    pub fn broadcast(&self, method: &str, args: Vec<JsonValue>) -> usize {
        let frame = match self.codec.encode(&Envelope::Event {
            method: method.to_string(),
            args,
        }) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(method, error = %e, "failed to encode broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, channel) in self.snapshot() {
            match channel.post(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => trace!(channel = id, error = %e, "broadcast to closing channel dropped"),
            }
        }
        trace!(method, delivered, "broadcast sent");
        delivered
    }

    /// Handles one raw frame received on `channel`.
    ///
    /// Responses settle their pending call before this returns. Requests and
    /// events run on their own task, so a slow handler never holds up the
    /// replies behind it.
    pub fn handle_frame(self: &Arc<Self>, channel: ChannelId, raw: &str) {
        let Some(envelope) = self.codec.decode(raw) else {
            return;
        };

        match envelope {
            Envelope::Response { id, .. } => {
                let call = self.pending.lock().remove(&id);
                match call {
                    Some(call) => {
                        let _ = call.reply.send(envelope);
                    }
                    None => trace!(id, "unmatched rpc response dropped"),
                }
            }
            envelope => {
                let group = Arc::clone(self);
                tokio::spawn(async move { group.serve(channel, envelope).await });
            }
        }
    }

    async fn serve(&self, channel: ChannelId, envelope: Envelope) {
        match envelope {
            Envelope::Request { id, method, args } => {
                let response = match self.functions.invoke(&method, args).await {
                    Ok(result) => Envelope::Response {
                        id,
                        result: Some(result),
                        error: None,
                    },
                    Err(error) => Envelope::Response {
                        id,
                        result: None,
                        error: Some(error),
                    },
                };
                self.reply(channel, &response);
            }
            Envelope::Event { method, args } => {
                if let Err(RemoteError { message, .. }) = self.functions.invoke(&method, args).await {
                    trace!(method, %message, "event not handled");
                }
            }
            Envelope::Response { id, .. } => trace!(id, "response routed to a handler task"),
        }
    }

    fn reply(&self, channel: ChannelId, response: &Envelope) {
        let Some(target) = self.channel(channel) else {
            trace!(channel, "reply target left the group");
            return;
        };
        match self.codec.encode(response) {
            Ok(frame) => {
                if let Err(e) = target.post(frame) {
                    trace!(channel, error = %e, "reply dropped");
                }
            }
            Err(e) => warn!(channel, error = %e, "failed to encode rpc response"),
        }
    }

    /// Adds `channel` and spawns a task feeding its incoming frames into the
    /// group. The channel is removed when the incoming stream ends.
    pub fn attach(
        self: &Arc<Self>,
        channel: Arc<dyn Channel>,
        mut incoming: mpsc::UnboundedReceiver<String>,
    ) -> (ChannelId, JoinHandle<()>) {
        let id = self.add_channel(channel);
        let group = Arc::clone(self);
        let pump = tokio::spawn(async move {
            while let Some(raw) = incoming.recv().await {
                group.handle_frame(id, &raw);
            }
            group.remove_channel(id);
        });
        (id, pump)
    }
}
