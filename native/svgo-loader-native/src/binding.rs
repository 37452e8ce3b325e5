//! Node binding for JavaScript build hosts.
//!
//! The host drives the two phases from its own plugin hooks and hands the
//! pending imports of phase A back into phase B.

use napi_derive::napi;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::options::LoaderOptions;
use crate::pipeline::SvgoLoader;
use crate::registry::AssetRegistry;
use crate::transform::PendingImports;
use crate::watch::InvalidationDebouncer;

fn to_napi_err(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

#[napi]
pub struct NativeSvgoLoader {
    runtime: Runtime,
    loader: SvgoLoader,
    registry: Arc<AssetRegistry>,
    debouncer: InvalidationDebouncer,
}

#[napi]
impl NativeSvgoLoader {
    #[napi(constructor)]
    pub fn new(options_json: String) -> napi::Result<Self> {
        let options = LoaderOptions::from_json(&options_json).map_err(to_napi_err)?;
        let runtime = Runtime::new().map_err(to_napi_err)?;
        let registry = Arc::new(AssetRegistry::new(&options));
        let loader = SvgoLoader::new(&options, Arc::clone(&registry)).map_err(to_napi_err)?;
        let debouncer = {
            let _guard = runtime.enter();
            InvalidationDebouncer::spawn(Arc::clone(&registry), options.debounce())
        };
        Ok(Self {
            runtime,
            loader,
            registry,
            debouncer,
        })
    }

    /// Phase A. Returns `{ code, map, pending }` or `null` when untouched.
    #[napi]
    pub fn detect(&self, code: String, id: String) -> napi::Result<Option<serde_json::Value>> {
        let Some(spliced) = self.runtime.block_on(self.loader.detect(&code, &id)) else {
            return Ok(None);
        };
        Ok(Some(json!({
            "code": spliced.output.code,
            "map": spliced.output.map,
            "pending": serde_json::to_value(&spliced.pending).map_err(to_napi_err)?,
        })))
    }

    /// Phase B with the `pending` value returned by [`Self::detect`].
    #[napi]
    pub fn resolve(
        &self,
        code: String,
        id: String,
        pending: serde_json::Value,
    ) -> napi::Result<Option<serde_json::Value>> {
        let pending: PendingImports = serde_json::from_value(pending).map_err(to_napi_err)?;
        match self.loader.resolve(&code, &id, &pending) {
            Some(out) => serde_json::to_value(out).map(Some).map_err(to_napi_err),
            None => Ok(None),
        }
    }

    /// Forwards a host watcher event (`add`, `unlink`, ...).
    #[napi]
    pub fn on_watch_event(&self, event: String, path: String) -> bool {
        self.debouncer.notify_host(&event, &path)
    }

    #[napi]
    pub fn invalidate(&self) {
        self.registry.invalidate();
    }

    /// Asset listing as sent to devtools observers.
    #[napi]
    pub fn static_svg_files(&self) -> napi::Result<serde_json::Value> {
        let snapshot = self.runtime.block_on(self.registry.get());
        serde_json::to_value(snapshot.infos()).map_err(to_napi_err)
    }
}
