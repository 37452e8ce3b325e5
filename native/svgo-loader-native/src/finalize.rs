//! Finalize Module for the SVGO loader
//!
//! Phase B of the icon rewrite: prepends the imports recorded by phase A and
//! points the compiled template's component lookups at them.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::edit::{SourceEdit, Transformed};
use crate::transform::PendingImports;

lazy_static! {
    /// `resolveComponent("SvgoIcon...")` / `_resolveComponent('SvgoIcon...')` preceded by a space or `(`
    static ref RESOLVE_COMPONENT_REGEX: Regex =
        Regex::new(r#"([ (])_?resolveComponent\(\s*["'](SvgoIcon[^'"]*)["'][^)]*\)"#).unwrap();
}

fn emit_imports(pending: &PendingImports) -> String {
    pending
        .iter()
        .map(|spec| spec.statement())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Injects the pending imports of one file.
///
/// Returns `None` when phase A recorded nothing for this file.
pub fn inject_and_resolve(code: &str, id: &str, pending: &PendingImports) -> Option<Transformed> {
    if pending.is_empty() {
        trace!(id, "no pending imports");
        return None;
    }

    let mut edit = SourceEdit::new(code);
    edit.prepend(&format!("{}\n", emit_imports(pending)));

    let mut resolved = 0;
    for caps in RESOLVE_COMPONENT_REGEX.captures_iter(code) {
        let (Some(whole), Some(lead), Some(component)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        // only lookups of components this pass imported
        let Some(spec) = pending.get(component.as_str()) else {
            continue;
        };
        if edit.overwrite(whole.start() + lead.len(), whole.end(), &spec.local) {
            resolved += 1;
        }
    }

    debug!(id, imports = pending.len(), resolved, "icon imports injected");
    Some(edit.finish(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::AssetEntry;
    use crate::transform::Strategy;
    use std::path::PathBuf;

    fn pending_for(names: &[(&str, Strategy)]) -> PendingImports {
        let mut pending = PendingImports::default();
        for (name, strategy) in names {
            pending.record(
                *strategy,
                &AssetEntry {
                    name: name.to_string(),
                    prefix: String::new(),
                    source_path: PathBuf::from(format!("/app/assets/{}.svg", name)),
                    relative_path: format!("assets/{}.svg", name),
                    size: 1,
                    modified_ms: 0,
                },
            );
        }
        pending
    }

    #[test]
    fn test_empty_pending_is_noop() {
        assert!(inject_and_resolve("const a = 1", "/a.vue", &PendingImports::default()).is_none());
    }

    #[test]
    fn test_prepends_imports_and_rewrites_lookups() {
        let pending = pending_for(&[("home", Strategy::Component), ("star", Strategy::Skipsvgo)]);
        let code = concat!(
            "const _component_A = _resolveComponent(\"SvgoIconComponentHome\")\n",
            "const _component_B = resolveComponent( 'SvgoIconSkipsvgoStar' )\n",
            "return (_openBlock(), _createBlock(_component_A))"
        );

        let out = inject_and_resolve(code, "/app/App.vue", &pending).unwrap();
        assert_eq!(
            out.code,
            concat!(
                "import __SvgoIconComponentHome from \"/app/assets/home.svg?component\";\n",
                "import __SvgoIconSkipsvgoStar from \"/app/assets/star.svg?skipsvgo\";\n",
                "const _component_A = __SvgoIconComponentHome\n",
                "const _component_B = __SvgoIconSkipsvgoStar\n",
                "return (_openBlock(), _createBlock(_component_A))"
            )
        );
        assert!(out.map.is_some());
    }

    #[test]
    fn test_inline_lookup_after_paren() {
        let pending = pending_for(&[("home", Strategy::Component)]);
        let code = "h(_resolveComponent(\"SvgoIconComponentHome\"), { class: 'x' })";
        let out = inject_and_resolve(code, "/a.vue", &pending).unwrap();
        assert!(out.code.ends_with("h(__SvgoIconComponentHome, { class: 'x' })"));
    }

    #[test]
    fn test_unrelated_lookups_are_left_alone() {
        let pending = pending_for(&[("home", Strategy::Component)]);
        let code = concat!(
            "const a = _resolveComponent(\"SvgoIconCustom\")\n",
            "const b = _resolveComponent(\"RouterLink\")\n",
            "const c =_resolveComponent(\"SvgoIconComponentHome\")"
        );
        let out = inject_and_resolve(code, "/a.vue", &pending).unwrap();
        assert!(out.code.contains("_resolveComponent(\"SvgoIconCustom\")"));
        assert!(out.code.contains("_resolveComponent(\"RouterLink\")"));
        // not preceded by a space or paren
        assert!(out.code.contains("=_resolveComponent(\"SvgoIconComponentHome\")"));
    }
}
