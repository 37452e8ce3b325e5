//! Transform Module for the SVGO loader
//!
//! Phase A of the icon rewrite: finds `<SvgoIcon>` / `<svgo-icon>` usages in a
//! component template, resolves each `name` against the asset snapshot and
//! splices the element into a reference to a concrete, statically imported
//! component. The imports themselves are injected by phase B
//! (see [`crate::finalize`]).

use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, trace};

use crate::discovery::{AssetEntry, Snapshot};
use crate::edit::{SourceEdit, Transformed};
use crate::parse::{
    parse_template, render_element, script_regions, template_region, Element, MarkupNode,
    MarkupOutcome,
};
use crate::scope::{analyze_regions, ScopeOutcome, ScopeTable};
use crate::visitor::{walk, walk_element, MarkupVisitor};

lazy_static! {
    /// Cheap pre-check before any parsing
    static ref VIRTUAL_ICON_REGEX: Regex = Regex::new(r"\b(?:svgo-icon|SvgoIcon)\b").unwrap();
}

/// Tag names of the virtual icon element.
pub const VIRTUAL_TAGS: &[&str] = &["SvgoIcon", "svgo-icon"];

/// Prefix shared by every synthesized component name.
pub const COMPONENT_PREFIX: &str = "SvgoIcon";

// ═══════════════════════════════════════════════════════════════════════════════
// STRATEGY
// ═══════════════════════════════════════════════════════════════════════════════

/// How an icon asset is imported. Sent to the host as the import query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Component,
    /// Component without the optimizer pass.
    Skipsvgo,
    Url,
    Raw,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Component => "component",
            Strategy::Skipsvgo => "skipsvgo",
            Strategy::Url => "url",
            Strategy::Raw => "raw",
        }
    }

    /// Parses a strategy attribute, falling back to `default` for unknown values.
    pub fn from_attr(value: Option<&str>, default: Strategy) -> Strategy {
        value.and_then(|v| v.parse().ok()).unwrap_or(default)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "component" => Ok(Strategy::Component),
            "skipsvgo" => Ok(Strategy::Skipsvgo),
            "url" => Ok(Strategy::Url),
            "raw" => Ok(Strategy::Raw),
            other => Err(format!("unknown icon strategy `{}`", other)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PENDING IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSpec {
    /// Component name the template element was renamed to.
    pub component: String,
    /// Identifier bound by the import statement.
    pub local: String,
    pub source_path: PathBuf,
    pub strategy: Strategy,
    pub key: String,
}

impl ImportSpec {
    pub fn specifier(&self) -> String {
        format!("{}?{}", self.source_path.to_string_lossy(), self.strategy)
    }

    pub fn statement(&self) -> String {
        let specifier = serde_json::to_string(&self.specifier())
            .unwrap_or_else(|_| format!("\"{}\"", self.specifier()));
        format!("import {} from {};", self.local, specifier)
    }
}

/// Imports one file pass needs, keyed by component name, in first-use order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingImports {
    imports: IndexMap<String, ImportSpec>,
}

impl PendingImports {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn get(&self, component: &str) -> Option<&ImportSpec> {
        self.imports.get(component)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportSpec> {
        self.imports.values()
    }

    /// Records the import for `entry` and returns the component name to use.
    ///
    /// Names are derived from the strategy and the entry key. Two keys that
    /// flatten to the same name but point at different files get a suffix
    /// hashed from the key.
    pub fn record(&mut self, strategy: Strategy, entry: &AssetEntry) -> String {
        let key = entry.key();
        let base = component_name(strategy, &key);

        let component = match self.imports.get(&base) {
            Some(existing) if existing.source_path != entry.source_path => {
                format!("{}{}", base, short_hash(&key))
            }
            _ => base,
        };

        self.imports
            .entry(component.clone())
            .or_insert_with(|| ImportSpec {
                component: component.clone(),
                local: format!("__{}", component),
                source_path: entry.source_path.clone(),
                strategy,
                key,
            });
        component
    }
}

pub fn component_name(strategy: Strategy, key: &str) -> String {
    format!(
        "{}{}{}",
        COMPONENT_PREFIX,
        strategy.as_str().to_upper_camel_case(),
        key.to_upper_camel_case()
    )
}

fn short_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PHASE A: DETECT & SPLICE
// ═══════════════════════════════════════════════════════════════════════════════

/// Output of phase A for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Spliced {
    pub output: Transformed,
    pub pending: PendingImports,
}

pub fn is_virtual_tag(name: &str) -> bool {
    VIRTUAL_TAGS.contains(&name)
}

/// Rewrites virtual icon elements of one file.
///
/// Returns `None` when the file is left untouched.
pub fn detect_and_splice(
    code: &str,
    id: &str,
    snapshot: &Snapshot,
    default_strategy: Strategy,
) -> Option<Spliced> {
    if !VIRTUAL_ICON_REGEX.is_match(code) {
        trace!(id, "no virtual icons");
        return None;
    }

    let regions = script_regions(code);
    let scope = match analyze_regions(&regions) {
        ScopeOutcome::Complete(table) => table,
        ScopeOutcome::Partial { table, reason } => {
            debug!(id, %reason, "script analysis degraded");
            table
        }
    };

    let (offset, template) = template_region(code)?;

    let mut document = match parse_template(template) {
        MarkupOutcome::Parsed(document) => document,
        MarkupOutcome::Degraded(reason) => {
            debug!(id, %reason, "template not parseable, skipping");
            return None;
        }
    };

    let mut pending = PendingImports::default();
    let mut rewriter = IconRewriter {
        id,
        offset,
        scope: &scope,
        snapshot,
        default_strategy,
        edit: SourceEdit::new(code),
        pending: &mut pending,
        detach: false,
    };
    walk(&mut document, &mut rewriter);

    let IconRewriter { edit, .. } = rewriter;
    if !edit.has_changed() {
        return None;
    }

    let output = edit.finish(id);
    debug!(id, imports = pending.len(), "virtual icons spliced");
    Some(Spliced { output, pending })
}

struct IconRewriter<'a> {
    id: &'a str,
    offset: usize,
    scope: &'a ScopeTable,
    snapshot: &'a Snapshot,
    default_strategy: Strategy,
    edit: SourceEdit<'a>,
    pending: &'a mut PendingImports,
    /// Set when the element just visited must leave its parent.
    detach: bool,
}

impl IconRewriter<'_> {
    fn is_shadowed(&self, tag: &str, at: usize) -> bool {
        self.scope.is_declared_at(tag, at)
            || self.scope.is_declared_at(&tag.to_upper_camel_case(), at)
    }

    fn remove(&mut self, start: usize, end: usize) {
        self.edit.remove(start, end);
        self.detach = true;
    }
}

impl MarkupVisitor for IconRewriter<'_> {
    fn visit_element(&mut self, element: &mut Element) {
        // children first so nested icons are already rewritten when rendered
        walk_element(self, element);

        if !is_virtual_tag(&element.name) {
            return;
        }

        let start = element.span.start + self.offset;
        let end = element.span.end + self.offset;

        if self.is_shadowed(&element.name, start) {
            trace!(id = self.id, tag = %element.name, "virtual icon shadowed by local binding");
            return;
        }

        let strategy = Strategy::from_attr(element.attr("strategy"), self.default_strategy);

        let Some(name) = element.attr("name").filter(|n| !n.is_empty()) else {
            debug!(id = self.id, start, "icon without name removed");
            self.remove(start, end);
            return;
        };

        let snapshot = self.snapshot;
        let Some(entry) = snapshot.get(name) else {
            debug!(id = self.id, icon = name, "unresolved icon removed");
            self.remove(start, end);
            return;
        };

        let component = self.pending.record(strategy, entry);
        element.rename(component);
        element.remove_attr("name");
        element.remove_attr("strategy");

        let rendered = render_element(element);
        self.edit.overwrite(start, end, &rendered);
    }

    fn retain(&mut self, _node: &MarkupNode) -> bool {
        !std::mem::take(&mut self.detach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prefix: &str, name: &str, path: &str) -> AssetEntry {
        AssetEntry {
            name: name.to_string(),
            prefix: prefix.to_string(),
            source_path: PathBuf::from(path),
            relative_path: format!("{}.svg", name),
            size: 1,
            modified_ms: 0,
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(Strategy::from_attr(Some("skipsvgo"), Strategy::Component), Strategy::Skipsvgo);
        assert_eq!(Strategy::from_attr(Some("raw"), Strategy::Component), Strategy::Raw);
        assert_eq!(Strategy::from_attr(Some("bogus"), Strategy::Url), Strategy::Url);
        assert_eq!(Strategy::from_attr(None, Strategy::Component), Strategy::Component);
    }

    #[test]
    fn test_component_names() {
        assert_eq!(component_name(Strategy::Component, "home"), "SvgoIconComponentHome");
        assert_eq!(component_name(Strategy::Skipsvgo, "arrow-left"), "SvgoIconSkipsvgoArrowLeft");
        assert_eq!(component_name(Strategy::Component, "ui:home"), "SvgoIconComponentUiHome");
    }

    #[test]
    fn test_record_dedupes_and_disambiguates() {
        let mut pending = PendingImports::default();
        let a = entry("ui", "home", "/a/ui/home.svg");
        let b = entry("", "ui-home", "/a/ui-home.svg");

        let first = pending.record(Strategy::Component, &a);
        let again = pending.record(Strategy::Component, &a);
        let other = pending.record(Strategy::Component, &b);

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert!(other.starts_with("SvgoIconComponentUiHome"));
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_import_statement() {
        let mut pending = PendingImports::default();
        let component = pending.record(Strategy::Skipsvgo, &entry("", "home", "/app/assets/home.svg"));
        let spec = pending.get(&component).unwrap();
        assert_eq!(
            spec.statement(),
            r#"import __SvgoIconSkipsvgoHome from "/app/assets/home.svg?skipsvgo";"#
        );
    }

    #[test]
    fn test_fast_reject_requires_whole_word() {
        let snapshot = Snapshot::from_entries([entry("", "home", "/a/home.svg")]);
        let code = "<template><SvgoIconComponentHome /></template>";
        assert!(detect_and_splice(code, "/a.vue", &snapshot, Strategy::Component).is_none());
    }
}
