//! # SVGO Icon Loader
//!
//! Build-time resolution of `<SvgoIcon name="...">` usages in component
//! templates to statically imported icon assets.
//!
//! ## Pipeline
//!
//! 1. **Detect & splice** (`transform`): scope analysis over the `<script>`
//!    regions, template parse, every unshadowed virtual icon either renamed to
//!    a synthesized component or removed when it cannot be resolved.
//! 2. **Inject & resolve** (`finalize`): the recorded imports are prepended
//!    and compiled `resolveComponent("SvgoIcon...")` lookups point at them.
//!
//! ## Asset Registry
//!
//! `AssetRegistry` caches one scan of the icon roots. Filesystem add/remove
//! events go through `InvalidationDebouncer`, which invalidates the cache once
//! per window and signals `DevtoolsServer` to broadcast `refresh` to every
//! connected observer.

#[cfg(feature = "napi")]
mod binding;

mod discovery;
mod edit;
mod error;
mod filter;
mod finalize;
mod options;
mod parse;
mod pipeline;
mod registry;
pub mod rpc;
mod scope;
mod transform;
mod visitor;
mod watch;

#[cfg(test)]
mod engine_tests;

#[cfg(feature = "napi")]
pub use binding::NativeSvgoLoader;

pub use discovery::{asset_key, scan, AssetEntry, AssetInfo, Snapshot};
pub use edit::{SourceEdit, Transformed};
pub use error::{ChannelError, LoaderError, Result, RpcError};
pub use filter::{is_vue, TransformFilter};
pub use finalize::inject_and_resolve;
pub use options::{AssetRoot, LoaderOptions};
pub use parse::{
    parse_template, render, render_element, script_regions, template_region, Attribute, Document,
    Element, MarkupNode, MarkupOutcome, ScriptRegion, Span,
};
pub use pipeline::{FileOutput, SourceFile, SvgoLoader};
pub use registry::AssetRegistry;
pub use scope::{analyze, analyze_regions, is_declared_at, ScopeOutcome, ScopeRecord, ScopeTable};
pub use transform::{
    component_name, detect_and_splice, ImportSpec, PendingImports, Spliced, Strategy,
};
pub use visitor::{walk, MarkupVisitor};
pub use watch::{AssetWatcher, InvalidationDebouncer, RefreshSignal, WatchEvent};
