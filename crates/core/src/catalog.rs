//! The provider capability catalog document.
//!
//! Probe runs enrich this document in place: detection results land as
//! children of each provider's `<options>` subtree, while everything else in
//! the document — unknown elements, attributes, comments — rides through
//! untouched. Operators can pin an option by marking it read-only; probes
//! never overwrite a pinned value.

use crate::results::ProbeResults;
use crate::xml::{Element, Node, XmlError};

/// Namespace reserved for catalog annotations the probes must respect.
pub const READONLY_NS: &str = "urn:blogprobe:options";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("document root must be <providers>, found <{0}>")]
    WrongRoot(String),
    #[error("provider entry without an id")]
    MissingId,
    #[error("unknown provider id: {0}")]
    UnknownProvider(String),
}

/// Snapshot view of one provider entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub client_type: String,
    pub excluded_probes: Vec<String>,
}

/// The whole catalog document, held as a tree for shape fidelity.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    root: Element,
}

impl ProviderCatalog {
    pub fn parse(xml: &str) -> Result<ProviderCatalog, CatalogError> {
        let root = Element::parse(xml)?;
        if root.name != "providers" {
            return Err(CatalogError::WrongRoot(root.name));
        }
        for provider in root.children_named("provider") {
            if provider_id(provider).is_none() {
                return Err(CatalogError::MissingId);
            }
        }
        Ok(ProviderCatalog { root })
    }

    pub fn to_xml(&self) -> String {
        self.root.to_xml()
    }

    /// Providers in document order.
    pub fn providers(&self) -> Vec<Provider> {
        self.root
            .children_named("provider")
            .filter_map(|el| {
                let id = provider_id(el)?;
                Some(Provider {
                    name: el
                        .child_text("name")
                        .filter(|name| !name.is_empty())
                        .unwrap_or_else(|| id.clone()),
                    client_type: el
                        .child_text("clientType")
                        .filter(|ct| !ct.is_empty())
                        .unwrap_or_else(|| "MetaWeblog".to_string()),
                    excluded_probes: el
                        .children_named("exclude")
                        .map(Element::text)
                        .collect(),
                    id,
                })
            })
            .collect()
    }

    pub fn provider(&self, id: &str) -> Option<Provider> {
        self.providers().into_iter().find(|p| p.id == id)
    }

    /// Write every detection result under the provider's `<options>`,
    /// creating the subtree and entries as needed. An entry carrying a
    /// read-only marker keeps its hand-curated value and the probe result is
    /// dropped.
    pub fn apply_results(
        &mut self,
        provider_id_wanted: &str,
        results: &ProbeResults,
    ) -> Result<(), CatalogError> {
        let mut decls = xmlns_decls(&self.root);
        let provider = self
            .root
            .children
            .iter_mut()
            .find_map(|node| match node {
                Node::Element(el)
                    if el.name == "provider"
                        && provider_id(el).as_deref() == Some(provider_id_wanted) =>
                {
                    Some(el)
                }
                _ => None,
            })
            .ok_or_else(|| CatalogError::UnknownProvider(provider_id_wanted.to_string()))?;
        decls.extend(xmlns_decls(provider));
        let options = provider.ensure_child("options");
        decls.extend(xmlns_decls(options));
        for (key, value) in results.iter() {
            let entry = options.ensure_child(key);
            let mut scope = decls.clone();
            scope.extend(xmlns_decls(entry));
            if !is_readonly(entry, &scope) {
                entry.set_text(value);
            }
        }
        Ok(())
    }
}

fn provider_id(el: &Element) -> Option<String> {
    el.child_text("id")
        .filter(|id| !id.is_empty())
        .or_else(|| el.attr("id").map(str::to_string))
}

fn xmlns_decls(el: &Element) -> Vec<(String, String)> {
    el.attributes
        .iter()
        .filter(|(key, _)| key.starts_with("xmlns"))
        .cloned()
        .collect()
}

/// A `readonly` attribute marks the entry as pinned: either unprefixed, or
/// prefixed with a prefix bound to [`READONLY_NS`] anywhere on the path from
/// the document root down to the entry.
fn is_readonly(entry: &Element, ns_decls: &[(String, String)]) -> bool {
    for (key, value) in &entry.attributes {
        let (prefix, local) = match key.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, key.as_str()),
        };
        if local != "readonly" {
            continue;
        }
        if !matches!(value.to_ascii_lowercase().as_str(), "true" | "yes" | "1") {
            continue;
        }
        match prefix {
            None => return true,
            Some(prefix) => {
                let wanted = format!("xmlns:{prefix}");
                if ns_decls
                    .iter()
                    .any(|(decl, uri)| *decl == wanted && uri == READONLY_NS)
                {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{NO, YES};

    const CATALOG: &str = r#"<?xml version="1.0"?>
        <providers>
          <provider>
            <id>wordpress</id>
            <name>WordPress</name>
            <clientType>MetaWeblog</clientType>
            <exclude>scripts</exclude>
          </provider>
          <provider>
            <id>bare</id>
          </provider>
        </providers>"#;

    #[test]
    fn test_parse_and_view_providers() {
        let catalog = ProviderCatalog::parse(CATALOG).unwrap();
        let providers = catalog.providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].id, "wordpress");
        assert_eq!(providers[0].name, "WordPress");
        assert_eq!(providers[0].client_type, "MetaWeblog");
        assert_eq!(providers[0].excluded_probes, vec!["scripts".to_string()]);
        // Defaults for a bare entry.
        assert_eq!(providers[1].name, "bare");
        assert_eq!(providers[1].client_type, "MetaWeblog");
        assert!(providers[1].excluded_probes.is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_root_and_missing_id() {
        assert!(matches!(
            ProviderCatalog::parse("<blogs/>"),
            Err(CatalogError::WrongRoot(_))
        ));
        assert!(matches!(
            ProviderCatalog::parse("<providers><provider/></providers>"),
            Err(CatalogError::MissingId)
        ));
    }

    #[test]
    fn test_apply_creates_options_entries() {
        let mut catalog = ProviderCatalog::parse(CATALOG).unwrap();
        let mut results = ProbeResults::new();
        results.add("supportsEmbeds", YES);
        results.add("supportsScripts", NO);
        catalog.apply_results("wordpress", &results).unwrap();

        let reparsed = ProviderCatalog::parse(&catalog.to_xml()).unwrap();
        let xml = reparsed.to_xml();
        assert!(xml.contains("<supportsEmbeds>Yes</supportsEmbeds>"), "{xml}");
        assert!(xml.contains("<supportsScripts>No</supportsScripts>"), "{xml}");
    }

    #[test]
    fn test_apply_overwrites_existing_entry() {
        let source = r#"<providers><provider><id>p</id>
            <options><supportsEmbeds>No</supportsEmbeds></options>
            </provider></providers>"#;
        let mut catalog = ProviderCatalog::parse(source).unwrap();
        let mut results = ProbeResults::new();
        results.add("supportsEmbeds", YES);
        catalog.apply_results("p", &results).unwrap();
        assert!(catalog.to_xml().contains("<supportsEmbeds>Yes</supportsEmbeds>"));
    }

    #[test]
    fn test_readonly_entry_is_preserved() {
        let source = r#"<providers><provider><id>p</id>
            <options><foo readonly="true" xmlns:br="urn:blogprobe:options">bar</foo></options>
            </provider></providers>"#;
        let mut catalog = ProviderCatalog::parse(source).unwrap();
        let mut results = ProbeResults::new();
        results.add("foo", "baz");
        catalog.apply_results("p", &results).unwrap();
        let xml = catalog.to_xml();
        assert!(xml.contains(">bar</foo>"), "{xml}");
        assert!(!xml.contains("baz"), "{xml}");
    }

    #[test]
    fn test_prefixed_readonly_resolves_through_the_root() {
        let source = r#"<providers xmlns:probe="urn:blogprobe:options">
            <provider><id>p</id>
            <options><foo probe:readonly="yes">pinned</foo></options>
            </provider></providers>"#;
        let mut catalog = ProviderCatalog::parse(source).unwrap();
        let mut results = ProbeResults::new();
        results.add("foo", "probed");
        catalog.apply_results("p", &results).unwrap();
        assert!(catalog.to_xml().contains(">pinned</foo>"));
    }

    #[test]
    fn test_prefix_bound_to_another_namespace_is_not_readonly() {
        let source = r#"<providers xmlns:other="urn:something:else">
            <provider><id>p</id>
            <options><foo other:readonly="true">old</foo></options>
            </provider></providers>"#;
        let mut catalog = ProviderCatalog::parse(source).unwrap();
        let mut results = ProbeResults::new();
        results.add("foo", "new");
        catalog.apply_results("p", &results).unwrap();
        assert!(catalog.to_xml().contains(">new</foo>"));
    }

    #[test]
    fn test_apply_to_unknown_provider_fails() {
        let mut catalog = ProviderCatalog::parse(CATALOG).unwrap();
        let results = ProbeResults::new();
        assert!(matches!(
            catalog.apply_results("nope", &results),
            Err(CatalogError::UnknownProvider(_))
        ));
    }
}
