//! Loader orchestration: filter, snapshot fetch, then both rewrite phases.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::discovery::Snapshot;
use crate::edit::Transformed;
use crate::error::LoaderError;
use crate::filter::TransformFilter;
use crate::finalize::inject_and_resolve;
use crate::options::LoaderOptions;
use crate::registry::AssetRegistry;
use crate::transform::{detect_and_splice, PendingImports, Spliced, Strategy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub id: String,
    pub code: String,
}

impl SourceFile {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
        }
    }
}

/// Both phase outputs for one file. Each map is against that phase's input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileOutput {
    pub id: String,
    pub spliced: Option<Transformed>,
    pub resolved: Option<Transformed>,
}

impl FileOutput {
    pub fn is_unchanged(&self) -> bool {
        self.spliced.is_none() && self.resolved.is_none()
    }

    /// Code after the last phase that changed it.
    pub fn final_code<'a>(&'a self, original: &'a str) -> &'a str {
        self.resolved
            .as_ref()
            .or(self.spliced.as_ref())
            .map(|t| t.code.as_str())
            .unwrap_or(original)
    }
}

pub struct SvgoLoader {
    filter: TransformFilter,
    registry: Arc<AssetRegistry>,
    default_strategy: Strategy,
}

impl SvgoLoader {
    pub fn new(options: &LoaderOptions, registry: Arc<AssetRegistry>) -> Result<Self, LoaderError> {
        let default_strategy = match options.default_strategy.parse() {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(error = %e, "falling back to the component strategy");
                Strategy::Component
            }
        };
        Ok(Self {
            filter: TransformFilter::new(options)?,
            registry,
            default_strategy,
        })
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    pub fn accepts(&self, id: &str) -> bool {
        self.filter.accepts(id)
    }

    /// Phase A for one file.
    pub async fn detect(&self, code: &str, id: &str) -> Option<Spliced> {
        if !self.accepts(id) {
            return None;
        }
        let snapshot = self.registry.get().await;
        detect_and_splice(code, id, &snapshot, self.default_strategy)
    }

    /// Phase B for one file, fed with the pending imports phase A returned.
    pub fn resolve(&self, code: &str, id: &str, pending: &PendingImports) -> Option<Transformed> {
        if !self.accepts(id) {
            return None;
        }
        inject_and_resolve(code, id, pending)
    }

    /// Runs both phases over many files against one snapshot.
    pub async fn transform_batch(&self, files: Vec<SourceFile>) -> Vec<FileOutput> {
        let snapshot = self.registry.get().await;
        let filter = self.filter.clone();
        let default_strategy = self.default_strategy;

        let count = files.len();
        let result = tokio::task::spawn_blocking(move || {
            transform_all(&files, &filter, &snapshot, default_strategy)
        })
        .await;

        match result {
            Ok(outputs) => {
                debug!(
                    files = count,
                    changed = outputs.iter().filter(|o| !o.is_unchanged()).count(),
                    "batch transformed"
                );
                outputs
            }
            Err(e) => {
                warn!(error = %e, "batch transform failed");
                Vec::new()
            }
        }
    }
}

fn transform_all(
    files: &[SourceFile],
    filter: &TransformFilter,
    snapshot: &Snapshot,
    default_strategy: Strategy,
) -> Vec<FileOutput> {
    files
        .par_iter()
        .map(|file| {
            let mut output = FileOutput {
                id: file.id.clone(),
                ..Default::default()
            };
            if !filter.accepts(&file.id) {
                return output;
            }
            if let Some(spliced) = detect_and_splice(&file.code, &file.id, snapshot, default_strategy) {
                output.resolved = inject_and_resolve(&spliced.output.code, &file.id, &spliced.pending);
                output.spliced = Some(spliced.output);
            }
            output
        })
        .collect()
}
