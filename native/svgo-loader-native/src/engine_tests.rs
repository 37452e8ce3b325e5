#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::discovery::{AssetEntry, Snapshot};
    use crate::finalize::inject_and_resolve;
    use crate::options::{AssetRoot, LoaderOptions};
    use crate::pipeline::{SourceFile, SvgoLoader};
    use crate::registry::AssetRegistry;
    use crate::transform::{detect_and_splice, Spliced, Strategy};

    fn entry(prefix: &str, name: &str) -> AssetEntry {
        let dir = if prefix.is_empty() { "icons" } else { prefix };
        AssetEntry {
            name: name.to_string(),
            prefix: prefix.to_string(),
            source_path: PathBuf::from(format!("/app/assets/{}/{}.svg", dir, name)),
            relative_path: format!("{}/{}.svg", dir, name),
            size: 12,
            modified_ms: 0,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::from_entries([
            entry("", "home"),
            entry("", "star"),
            entry("", "arrow-left"),
            entry("ui", "home"),
        ])
    }

    fn splice(code: &str) -> Spliced {
        detect_and_splice(code, "/app/App.vue", &snapshot(), Strategy::Component)
            .expect("expected the file to change")
    }

    #[test]
    fn test_resolved_icon_is_renamed_and_unresolved_removed() {
        let code = r#"<template>
  <div>
    <SvgoIcon name="home" class="w-4" />
    <SvgoIcon name="missing" />
  </div>
</template>
<script setup>
const count = 1
</script>"#;

        let spliced = splice(code);
        let out = &spliced.output.code;

        assert!(out.contains(r#"<SvgoIconComponentHome class="w-4" />"#));
        assert!(!out.contains("missing"));
        assert!(!out.contains("name="));
        assert!(out.contains("const count = 1"));

        assert_eq!(spliced.pending.len(), 1);
        let spec = spliced.pending.get("SvgoIconComponentHome").unwrap();
        assert_eq!(spec.local, "__SvgoIconComponentHome");
        assert_eq!(spec.key, "home");
        assert_eq!(spec.source_path, PathBuf::from("/app/assets/icons/home.svg"));
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let code = r#"<template><SvgoIcon name="home" /><svgo-icon name="star"></svgo-icon></template>"#;
        let spliced = splice(code);
        assert!(
            detect_and_splice(&spliced.output.code, "/app/App.vue", &snapshot(), Strategy::Component)
                .is_none()
        );
    }

    #[test]
    fn test_kebab_case_tag_and_strategy_attribute() {
        let code = r#"<template><svgo-icon name="arrow-left" strategy="skipsvgo"></svgo-icon></template>"#;
        let spliced = splice(code);
        assert_eq!(
            spliced.output.code,
            "<template><SvgoIconSkipsvgoArrowLeft></SvgoIconSkipsvgoArrowLeft></template>"
        );
        let spec = spliced.pending.get("SvgoIconSkipsvgoArrowLeft").unwrap();
        assert_eq!(spec.strategy, Strategy::Skipsvgo);
        assert_eq!(
            spec.statement(),
            r#"import __SvgoIconSkipsvgoArrowLeft from "/app/assets/icons/arrow-left.svg?skipsvgo";"#
        );
    }

    #[test]
    fn test_default_strategy_applies_without_attribute() {
        let code = r#"<template><SvgoIcon name="star" /><SvgoIcon name="home" strategy="nonsense" /></template>"#;
        let spliced = detect_and_splice(code, "/app/App.vue", &snapshot(), Strategy::Url).unwrap();
        assert!(spliced.pending.get("SvgoIconUrlStar").is_some());
        assert!(spliced.pending.get("SvgoIconUrlHome").is_some());
    }

    #[test]
    fn test_same_icon_with_two_strategies_yields_two_imports() {
        let code = r#"<template>
  <SvgoIcon name="home" />
  <SvgoIcon name="home" strategy="skipsvgo" />
  <SvgoIcon name="home" />
</template>"#;
        let spliced = splice(code);
        let components: Vec<&str> = spliced.pending.iter().map(|s| s.component.as_str()).collect();
        assert_eq!(components, vec!["SvgoIconComponentHome", "SvgoIconSkipsvgoHome"]);
        assert_eq!(spliced.output.code.matches("<SvgoIconComponentHome />").count(), 2);
    }

    #[test]
    fn test_prefixed_keys_resolve_to_distinct_components() {
        let code = r#"<template><SvgoIcon name="ui:home" /><SvgoIcon name="home" /></template>"#;
        let spliced = splice(code);
        assert_eq!(
            spliced.output.code,
            "<template><SvgoIconComponentUiHome /><SvgoIconComponentHome /></template>"
        );
        assert_eq!(
            spliced.pending.get("SvgoIconComponentUiHome").unwrap().source_path,
            PathBuf::from("/app/assets/ui/home.svg")
        );
    }

    #[test]
    fn test_script_binding_shadows_both_spellings() {
        let code = r#"<script setup lang="ts">
import SvgoIcon from './MyIcon.vue'
</script>
<template>
  <SvgoIcon name="home" />
  <svgo-icon name="star" />
</template>"#;
        assert!(detect_and_splice(code, "/app/App.vue", &snapshot(), Strategy::Component).is_none());
    }

    #[test]
    fn test_binding_inside_a_function_does_not_shadow_template() {
        let code = r#"<script>
export default {
  setup() {
    const SvgoIcon = null
    return {}
  }
}
</script>
<template><SvgoIcon name="home" /></template>"#;
        let spliced = splice(code);
        assert!(spliced.output.code.contains("<SvgoIconComponentHome />"));
    }

    #[test]
    fn test_unparseable_script_still_rewrites() {
        let code = r#"<script setup>
const = ;
</script>
<template><SvgoIcon name="home" /></template>"#;
        let spliced = splice(code);
        assert!(spliced.output.code.contains("<SvgoIconComponentHome />"));
    }

    #[test]
    fn test_nested_icons_are_rewritten_inside_out() {
        let code = r#"<template><SvgoIcon name="home" title="outer"><SvgoIcon name="star" /><SvgoIcon name="nope" /></SvgoIcon></template>"#;
        let spliced = splice(code);
        assert_eq!(
            spliced.output.code,
            r#"<template><SvgoIconComponentHome title="outer"><SvgoIconComponentStar /></SvgoIconComponentHome></template>"#
        );
        assert_eq!(spliced.pending.len(), 2);
    }

    #[test]
    fn test_icon_without_name_is_removed() {
        let code = r#"<template><p>a<SvgoIcon :name="dynamic" />b<SvgoIcon name="" /></p></template>"#;
        let spliced = splice(code);
        assert_eq!(spliced.output.code, "<template><p>ab</p></template>");
        assert!(spliced.pending.is_empty());
    }

    #[test]
    fn test_untouched_files() {
        let snapshot = snapshot();
        // no template
        assert!(detect_and_splice("const SvgoIcon = 1", "/app/a.vue", &snapshot, Strategy::Component).is_none());
        // degraded markup
        assert!(detect_and_splice(
            r#"<template><SvgoIcon name="home </template>"#,
            "/app/a.vue",
            &snapshot,
            Strategy::Component
        )
        .is_none());
    }

    #[test]
    fn test_source_map_points_back_to_input() {
        let code = "<template>\n  <SvgoIcon name=\"home\" />\n  <b>x</b>\n</template>";
        let spliced = splice(code);
        let map = sourcemap::SourceMap::from_slice(spliced.output.map.as_deref().unwrap().as_bytes()).unwrap();

        assert_eq!(map.get_source(0), Some("/app/App.vue"));
        // the replacement maps to the start of the original element
        let token = map.lookup_token(1, 10).unwrap();
        assert_eq!((token.get_src_line(), token.get_src_col()), (1, 2));
        // lines after the splice keep their origin
        let token = map.lookup_token(2, 4).unwrap();
        assert_eq!(token.get_src_line(), 2);
    }

    #[test]
    fn test_phase_b_rewrites_compiled_lookups() {
        let template = r#"<template><SvgoIcon name="home" /><SvgoIcon name="star" strategy="raw" /></template>"#;
        let pending = splice(template).pending;

        let compiled = r#"const _component_Other = _resolveComponent("SvgoIconOther")
const _component_SvgoIconComponentHome = _resolveComponent("SvgoIconComponentHome")
const _component_SvgoIconRawStar = _resolveComponent('SvgoIconRawStar', true)
"#;
        let out = inject_and_resolve(compiled, "/app/App.vue", &pending).unwrap();

        assert!(out.code.starts_with(
            "import __SvgoIconComponentHome from \"/app/assets/icons/home.svg?component\";\n\
         import __SvgoIconRawStar from \"/app/assets/icons/star.svg?raw\";\n"
        ));
        assert!(out.code.contains("const _component_SvgoIconComponentHome = __SvgoIconComponentHome\n"));
        assert!(out.code.contains("const _component_SvgoIconRawStar = __SvgoIconRawStar\n"));
        // lookups of components this pass did not record stay as they are
        assert!(out.code.contains(r#"_resolveComponent("SvgoIconOther")"#));
    }

    #[tokio::test]
    async fn test_loader_batch_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let icons = tmp.path().join("icons");
        fs::create_dir_all(icons.join("nav")).unwrap();
        fs::write(icons.join("home.svg"), "<svg/>").unwrap();
        fs::write(icons.join("nav").join("menu.svg"), "<svg/>").unwrap();

        let options = LoaderOptions::default().with_root(AssetRoot::new(icons.clone()));
        let registry = Arc::new(AssetRegistry::new(&options));
        let loader = SvgoLoader::new(&options, Arc::clone(&registry)).unwrap();

        let sfc = r#"<template><SvgoIcon name="home" /><SvgoIcon name="menu" /></template>"#;
        let outputs = loader
            .transform_batch(vec![
                SourceFile::new("/app/App.vue", sfc),
                SourceFile::new("/app/icons.ts", sfc),
                SourceFile::new("/app/Lazy.vue?nuxt_component=async", sfc),
            ])
            .await;

        assert_eq!(outputs.len(), 3);
        let app = &outputs[0];
        assert_eq!(app.id, "/app/App.vue");
        let code = app.final_code(sfc);
        let home = fs::canonicalize(icons.join("home.svg")).unwrap();
        assert!(code.starts_with(&format!(
            "import __SvgoIconComponentHome from {};",
            serde_json::to_string(&format!("{}?component", home.to_string_lossy())).unwrap()
        )));
        assert!(code.contains("<SvgoIconComponentMenu />"));

        assert!(outputs[1].is_unchanged());
        assert!(outputs[2].is_unchanged());
        assert_eq!(registry.scan_count(), 1);

        // a second batch reuses the cached snapshot
        let again = loader.detect(sfc, "/app/Other.vue").await.unwrap();
        assert_eq!(again.pending.len(), 2);
        assert_eq!(registry.scan_count(), 1);
    }
}
