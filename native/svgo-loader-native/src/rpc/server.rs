use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::channel::{Channel, ChannelId};
use super::functions::{FunctionTable, RpcNamespace};
use super::group::ChannelGroup;
use super::protocol::FrameCodec;
use crate::options::LoaderOptions;
use crate::registry::AssetRegistry;
use crate::watch::{RefreshSignal, STATIC_SVG_FILES_QUERY};

/// Event name pushed to observers when a query went stale.
pub const REFRESH_EVENT: &str = "refresh";

/// Root namespace answering observer queries.
pub struct ServerFunctions {
    registry: Arc<AssetRegistry>,
}

impl ServerFunctions {
    pub fn new(registry: Arc<AssetRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RpcNamespace for ServerFunctions {
    fn has_function(&self, name: &str) -> bool {
        name == STATIC_SVG_FILES_QUERY
    }

    async fn invoke(&self, name: &str, _args: Vec<JsonValue>) -> Result<JsonValue, String> {
        match name {
            STATIC_SVG_FILES_QUERY => {
                let snapshot = self.registry.get().await;
                serde_json::to_value(snapshot.infos()).map_err(|e| e.to_string())
            }
            other => Err(format!("no such method `{}`", other)),
        }
    }
}

/// Devtools endpoint: the channel group plus the server-side functions.
pub struct DevtoolsServer {
    group: Arc<ChannelGroup>,
}

impl DevtoolsServer {
    pub fn new(options: &LoaderOptions, registry: Arc<AssetRegistry>) -> Self {
        let functions = Arc::new(FunctionTable::default());
        functions.set_root(Arc::new(ServerFunctions::new(registry)));
        let group = ChannelGroup::new(
            FrameCodec::new(options.rpc_event_name.clone()),
            functions,
            options.rpc_timeout(),
        );
        Self {
            group: Arc::new(group),
        }
    }

    pub fn group(&self) -> &Arc<ChannelGroup> {
        &self.group
    }

    /// Registers an extra namespace, callable as `namespace:function`.
    pub fn extend(&self, namespace: impl Into<String>, handler: Arc<dyn RpcNamespace>) {
        let namespace = namespace.into();
        if self.group.functions().register(namespace.clone(), handler) {
            warn!(%namespace, "rpc namespace replaced");
        }
    }

    pub fn connect(
        &self,
        channel: Arc<dyn Channel>,
        incoming: mpsc::UnboundedReceiver<String>,
    ) -> (ChannelId, JoinHandle<()>) {
        self.group.attach(channel, incoming)
    }

    /// Turns every refresh signal into one `refresh` broadcast.
    pub fn forward_refreshes(
        &self,
        mut signals: broadcast::Receiver<RefreshSignal>,
    ) -> JoinHandle<()> {
        let group = Arc::clone(&self.group);
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => {
                        let delivered =
                            group.broadcast(REFRESH_EVENT, vec![JsonValue::String(signal.query)]);
                        debug!(delivered, "refresh pushed to observers");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "refresh signals lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
