use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::protocol::{ErrorCode, RemoteError};

/// A group of callable functions, addressed as `function` on the root
/// namespace or `namespace:function` otherwise.
#[async_trait]
pub trait RpcNamespace: Send + Sync {
    fn has_function(&self, name: &str) -> bool;

    async fn invoke(&self, name: &str, args: Vec<JsonValue>) -> Result<JsonValue, String>;
}

pub enum Resolution {
    Found {
        namespace: Arc<dyn RpcNamespace>,
        function: String,
    },
    NoSuchMethod,
    UnregisteredNamespace(String),
}

/// Capability table mapping method names to handlers.
#[derive(Default)]
pub struct FunctionTable {
    root: RwLock<Option<Arc<dyn RpcNamespace>>>,
    namespaces: RwLock<HashMap<String, Arc<dyn RpcNamespace>>>,
}

impl FunctionTable {
    pub fn set_root(&self, namespace: Arc<dyn RpcNamespace>) {
        *self.root.write() = Some(namespace);
    }

    /// Returns true when an earlier handler was replaced.
    pub fn register(&self, name: impl Into<String>, namespace: Arc<dyn RpcNamespace>) -> bool {
        self.namespaces.write().insert(name.into(), namespace).is_some()
    }

    pub fn resolve(&self, method: &str) -> Resolution {
        let (namespace, function) = match method.split_once(':') {
            Some((ns, function)) => match self.namespaces.read().get(ns) {
                Some(namespace) => (Arc::clone(namespace), function),
                None => return Resolution::UnregisteredNamespace(ns.to_string()),
            },
            None => match self.root.read().as_ref() {
                Some(root) => (Arc::clone(root), method),
                None => return Resolution::NoSuchMethod,
            },
        };

        if namespace.has_function(function) {
            Resolution::Found {
                namespace,
                function: function.to_string(),
            }
        } else {
            Resolution::NoSuchMethod
        }
    }

    pub async fn invoke(&self, method: &str, args: Vec<JsonValue>) -> Result<JsonValue, RemoteError> {
        match self.resolve(method) {
            Resolution::Found {
                namespace,
                function,
            } => namespace.invoke(&function, args).await.map_err(|message| {
                warn!(method, %message, "rpc handler failed");
                RemoteError::new(ErrorCode::Failed, message)
            }),
            Resolution::NoSuchMethod => Err(RemoteError::new(
                ErrorCode::NoSuchMethod,
                format!("no such method `{}`", method),
            )),
            Resolution::UnregisteredNamespace(ns) => Err(RemoteError::new(
                ErrorCode::UnregisteredNamespace,
                format!("namespace `{}` is not registered", ns),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl RpcNamespace for Echo {
        fn has_function(&self, name: &str) -> bool {
            matches!(name, "echo" | "fail")
        }

        async fn invoke(&self, name: &str, args: Vec<JsonValue>) -> Result<JsonValue, String> {
            match name {
                "echo" => Ok(JsonValue::Array(args)),
                _ => Err("boom".to_string()),
            }
        }
    }

    #[tokio::test]
    async fn test_resolution_outcomes() {
        let table = FunctionTable::default();
        table.set_root(Arc::new(Echo));
        table.register("tools", Arc::new(Echo));

        assert_eq!(table.invoke("echo", vec![json!(1)]).await.unwrap(), json!([1]));
        assert_eq!(table.invoke("tools:echo", vec![]).await.unwrap(), json!([]));

        let err = table.invoke("tools:missing", vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoSuchMethod);

        let err = table.invoke("ghost:echo", vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnregisteredNamespace);
        assert!(err.is_unresolved());

        let err = table.invoke("fail", vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Failed);
        assert!(!err.is_unresolved());
    }

    #[test]
    fn test_empty_table_has_no_methods() {
        let table = FunctionTable::default();
        assert!(matches!(table.resolve("anything"), Resolution::NoSuchMethod));
    }
}
