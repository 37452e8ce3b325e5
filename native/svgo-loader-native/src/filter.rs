//! Decides which module ids the transform runs on.

use regex::Regex;

use crate::error::LoaderError;
use crate::options::LoaderOptions;

#[derive(Debug, Clone, Default)]
pub struct TransformFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl TransformFilter {
    pub fn new(options: &LoaderOptions) -> Result<Self, LoaderError> {
        Ok(Self {
            include: compile_patterns("include", &options.include)?,
            exclude: compile_patterns("exclude", &options.exclude)?,
        })
    }

    /// Exclusion wins over inclusion; anything else falls back to the Vue id check.
    pub fn accepts(&self, id: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(id)) {
            return false;
        }
        if self.include.iter().any(|re| re.is_match(id)) {
            return true;
        }
        is_vue(id)
    }
}

fn compile_patterns(field: &'static str, patterns: &[String]) -> Result<Vec<Regex>, LoaderError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| LoaderError::InvalidPattern {
                field,
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// True for module ids that carry Vue SFC content: a bare `.vue` file, a
/// `?macro=` request with any non-empty value, or any `?vue&type=...`
/// sub-request. Async component wrappers (`?nuxt_component=...`) are never
/// Vue content.
pub fn is_vue(id: &str) -> bool {
    let (path, query) = match id.split_once('?') {
        Some((path, query)) => (path, query),
        None => (id, ""),
    };

    if query.is_empty() {
        return path.ends_with(".vue");
    }

    let mut has_vue = false;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "nuxt_component" => return false,
            "macro" if !value.is_empty() => return true,
            "vue" => has_vue = true,
            _ => {}
        }
    }

    has_vue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_vue() {
        assert!(is_vue("/app/components/Nav.vue"));
        assert!(is_vue("/app/pages/index.vue?macro=true"));
        // any non-empty value counts
        assert!(is_vue("/app/pages/index.vue?macro=false"));
        assert!(!is_vue("/app/pages/index.vue?macro="));
        assert!(is_vue("/app/pages/index.vue?vue&type=template&lang.js"));
        assert!(is_vue("/app/pages/index.vue?vue&type=script&setup=true"));

        assert!(!is_vue("/app/utils/icons.ts"));
        assert!(!is_vue("/app/components/Nav.vue?nuxt_component=async"));
        assert!(!is_vue("/app/components/Nav.vue?raw"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let options = LoaderOptions {
            include: vec![r"\.md$".to_string(), r"legacy".to_string()],
            exclude: vec![r"legacy".to_string()],
            ..Default::default()
        };
        let filter = TransformFilter::new(&options).unwrap();

        assert!(filter.accepts("/content/post.md"));
        assert!(filter.accepts("/app/App.vue"));
        assert!(!filter.accepts("/app/legacy/Old.vue"));
        assert!(!filter.accepts("/app/main.ts"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let options = LoaderOptions {
            exclude: vec!["(".to_string()],
            ..Default::default()
        };
        match TransformFilter::new(&options) {
            Err(LoaderError::InvalidPattern { field, pattern, .. }) => {
                assert_eq!(field, "exclude");
                assert_eq!(pattern, "(");
            }
            other => panic!("expected invalid pattern, got {:?}", other),
        }
    }
}
