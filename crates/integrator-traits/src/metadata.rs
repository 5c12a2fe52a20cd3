//! Source resolution and endpoint metadata extraction.

use crate::resources::ResourceSet;
use async_trait::async_trait;
use integrator_core::catalog::CatalogEntry;
use integrator_core::integration::{Integration, SourceSpec};
use integrator_core::{Error, Result};
use kube::ResourceExt;
use regex::Regex;
use std::sync::LazyLock;

// from("scheme:...") in the Groovy/Java/JS/Kotlin DSLs
static DSL_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"from\s*\(\s*["']([a-zA-Z0-9+.-]+:[^"']*)["']"#).unwrap()
});

// <from uri="scheme:..."/> in XML routes
static XML_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<from\s+uri\s*=\s*"([a-zA-Z0-9+.-]+:[^"]*)""#).unwrap()
});

// from: "scheme:..." or a nested uri: under from: in YAML routes
static YAML_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"from\s*:\s*(?:\n\s*uri\s*:\s*)?["']?([a-zA-Z0-9+.-]+:[^"'\s]+)"#).unwrap()
});

/// Source content ready for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub name: String,
    pub language: Option<String>,
    pub content: String,
}

/// Endpoint facts about a set of sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Endpoint URIs consumed by the routes.
    pub from_uris: Vec<String>,
    /// Some consumer exposes an HTTP service.
    pub requires_http_service: bool,
    /// Every consumer only reacts to incoming requests.
    pub passive_endpoints: bool,
}

/// Finds the content of an integration's sources.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(
        &self,
        integration: &Integration,
        resources: &ResourceSet,
    ) -> Result<Vec<ResolvedSource>>;
}

/// Resolves inline sources and ConfigMaps generated in the current pass.
#[derive(Debug, Default)]
pub struct InlineSourceResolver;

#[async_trait]
impl SourceResolver for InlineSourceResolver {
    async fn resolve(
        &self,
        integration: &Integration,
        resources: &ResourceSet,
    ) -> Result<Vec<ResolvedSource>> {
        integration
            .spec
            .sources
            .iter()
            .map(|s| {
                resolve_local(s, resources).ok_or_else(|| {
                    Error::NotFound(format!(
                        "content of source {} of integration {}",
                        s.name,
                        integration.name_any()
                    ))
                })
            })
            .collect()
    }
}

/// Resolve a source from its inline content or from a ConfigMap of the
/// current pass. `None` when neither holds it.
pub fn resolve_local(source: &SourceSpec, resources: &ResourceSet) -> Option<ResolvedSource> {
    let content = match (&source.content, &source.content_ref) {
        (Some(content), _) => content.clone(),
        (None, Some(cm)) => resources
            .get_config_map(cm)?
            .data
            .as_ref()?
            .get(source.content_key())?
            .clone(),
        (None, None) => return None,
    };
    Some(ResolvedSource {
        name: source.name.clone(),
        language: source_language(source).map(str::to_string),
        content,
    })
}

/// Declared language of a source, or the one implied by its file extension.
pub fn source_language(source: &SourceSpec) -> Option<&str> {
    if let Some(lang) = source.language.as_deref().filter(|l| !l.is_empty()) {
        return Some(lang);
    }
    let ext = source.name.rsplit_once('.')?.1;
    match ext {
        "groovy" => Some("groovy"),
        "java" => Some("java"),
        "js" => Some("js"),
        "kts" => Some("kts"),
        "xml" => Some("xml"),
        "yaml" | "yml" => Some("yaml"),
        _ => None,
    }
}

/// Endpoint URIs consumed by one source.
pub fn extract_from_uris(source: &ResolvedSource) -> Vec<String> {
    let language = source.language.as_deref().unwrap_or_default();
    let pattern: &Regex = match language {
        "xml" => &XML_FROM,
        "yaml" => &YAML_FROM,
        _ => &DSL_FROM,
    };
    pattern
        .captures_iter(&source.content)
        .map(|c| c[1].to_string())
        .collect()
}

/// Metadata across all sources, judged against the catalog's scheme
/// capabilities. Schemes the catalog does not know are neither HTTP nor
/// passive.
pub fn extract_all(catalog: Option<&CatalogEntry>, sources: &[ResolvedSource]) -> SourceMetadata {
    let from_uris: Vec<String> = sources.iter().flat_map(extract_from_uris).collect();

    let capability = |uri: &str| {
        let scheme = uri.split_once(':').map(|(s, _)| s).unwrap_or(uri);
        catalog.and_then(|c| c.scheme(scheme)).copied().unwrap_or_default()
    };

    SourceMetadata {
        requires_http_service: from_uris.iter().any(|u| capability(u.as_str()).http),
        passive_endpoints: from_uris.iter().all(|u| capability(u.as_str()).passive),
        from_uris,
    }
}
