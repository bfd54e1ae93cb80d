// file: src/registry/mod.rs
// version: 1.0.0
// guid: 26222885-714f-4bb8-8156-31defbc45edf

//! Capability definition discovery
//!
//! The registry lists and fetches workload and trait definitions from the
//! cluster and normalizes them into [`CapabilityDefinition`]s. A definition
//! whose spec cannot be interpreted is reported as
//! [`VelaError::DefinitionInvalid`] for that entry alone; only failures of
//! the cluster call itself fail the whole listing.

use crate::cluster::{ClusterClient, RawDefinition};
use crate::{Result, VelaError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Annotation carrying a one-line description of a definition
pub const DESCRIPTION_ANNOTATION: &str = "definition.oam.dev/description";

/// Kind of capability a definition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Workload,
    Trait,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Workload => "workload",
            CapabilityKind::Trait => "trait",
        }
    }

    /// Resource kind of the stored definition
    pub fn resource_kind(&self) -> &'static str {
        match self {
            CapabilityKind::Workload => "WorkloadDefinition",
            CapabilityKind::Trait => "TraitDefinition",
        }
    }

    /// Plural resource name used by the API server
    pub fn plural(&self) -> &'static str {
        match self {
            CapabilityKind::Workload => "workloaddefinitions",
            CapabilityKind::Trait => "traitdefinitions",
        }
    }

    /// Directory holding definitions in a local store
    pub fn dir_name(&self) -> &'static str {
        match self {
            CapabilityKind::Workload => "workloads",
            CapabilityKind::Trait => "traits",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter of a definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub usage: String,
    pub short: Option<char>,
}

/// Underlying resource a definition instantiates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateRef {
    pub resource: String,
    pub template: Option<String>,
}

/// A normalized workload or trait definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDefinition {
    pub kind: CapabilityKind,
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<ParameterDecl>,
    pub template: TemplateRef,
    /// Workload names a trait may be attached to; empty means any
    pub applies_to: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionSpec {
    definition_ref: Option<DefinitionRef>,
    #[serde(default)]
    applies_to_workloads: Vec<String>,
    #[serde(default)]
    extension: Option<Extension>,
}

#[derive(Debug, Deserialize)]
struct DefinitionRef {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Extension {
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    parameters: Vec<RawParameter>,
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    name: String,
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    usage: String,
    #[serde(default)]
    short: Option<String>,
}

fn definition_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("definition name regex")
    })
}

fn parameter_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").expect("parameter name regex"))
}

/// Whether an `appliesToWorkloads` list admits `workload`; empty or `*`
/// admits any
pub fn admits_workload(applies_to: &[String], workload: &str) -> bool {
    applies_to.is_empty() || applies_to.iter().any(|w| w == "*" || w == workload)
}

/// Check a user-supplied application or component name. Names end up in
/// file paths and URLs, so they must be DNS labels.
pub fn validate_target_name(what: &str, name: &str) -> Result<()> {
    if definition_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(VelaError::validation(format!(
            "invalid {} name '{}': must be a lowercase DNS label",
            what, name
        )))
    }
}

impl CapabilityDefinition {
    /// Normalize a raw cluster resource
    pub fn from_raw(kind: CapabilityKind, raw: &RawDefinition) -> Result<Self> {
        let name = raw.name();

        if !definition_name_regex().is_match(name) {
            return Err(VelaError::definition_invalid(
                name,
                "name must be a lowercase DNS label",
            ));
        }

        if !raw.kind.is_empty() && raw.kind != kind.resource_kind() {
            return Err(VelaError::definition_invalid(
                name,
                format!("expected kind {}, found {}", kind.resource_kind(), raw.kind),
            ));
        }

        let spec: DefinitionSpec = serde_json::from_value(raw.spec.clone())
            .map_err(|e| VelaError::definition_invalid(name, format!("malformed spec: {}", e)))?;

        let resource = spec
            .definition_ref
            .map(|r| r.name)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| VelaError::definition_invalid(name, "missing definitionRef.name"))?;

        let extension = spec.extension.unwrap_or_default();
        let mut seen = HashSet::new();
        let mut seen_shorts = HashSet::new();
        let mut parameters = Vec::with_capacity(extension.parameters.len());

        for param in extension.parameters {
            if !parameter_name_regex().is_match(&param.name) {
                return Err(VelaError::definition_invalid(
                    name,
                    format!("invalid parameter name '{}'", param.name),
                ));
            }
            if !seen.insert(param.name.clone()) {
                return Err(VelaError::definition_invalid(
                    name,
                    format!("duplicate parameter {}", param.name),
                ));
            }

            let short = match param.short.as_deref() {
                None | Some("") => None,
                Some(s) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
                        _ => {
                            return Err(VelaError::definition_invalid(
                                name,
                                format!("short flag '{}' of {} must be one letter", s, param.name),
                            ))
                        }
                    }
                }
            };

            if let Some(c) = short {
                if !seen_shorts.insert(c) {
                    return Err(VelaError::definition_invalid(
                        name,
                        format!("short flag '{}' of {} is already used by another parameter", c, param.name),
                    ));
                }
            }

            parameters.push(ParameterDecl {
                name: param.name,
                type_tag: param.type_tag,
                required: param.required,
                default: param.default,
                usage: param.usage,
                short,
            });
        }

        Ok(Self {
            kind,
            name: name.to_string(),
            description: raw.metadata.annotations.get(DESCRIPTION_ANNOTATION).cloned(),
            parameters,
            template: TemplateRef {
                resource,
                template: extension.template,
            },
            applies_to: spec.applies_to_workloads,
        })
    }

    /// Whether a trait may be attached to a component running `workload`
    pub fn applies_to_workload(&self, workload: &str) -> bool {
        admits_workload(&self.applies_to, workload)
    }

    /// One-line description for help output
    pub fn summary(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => match self.kind {
                CapabilityKind::Workload => format!("Run a {} workload", self.name),
                CapabilityKind::Trait => format!("Attach the {} trait to a component", self.name),
            },
        }
    }
}

/// Lists and fetches capability definitions from the cluster
#[derive(Clone)]
pub struct DefinitionRegistry {
    cluster: Arc<dyn ClusterClient>,
}

impl DefinitionRegistry {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// List all definitions of a kind, ordered by name. Entries that fail to
    /// normalize are returned as errors in place.
    pub async fn list_definitions(
        &self,
        kind: CapabilityKind,
    ) -> Result<Vec<Result<CapabilityDefinition>>> {
        let mut raws = self
            .cluster
            .list_definitions(kind)
            .await
            .map_err(|e| VelaError::Registry {
                kind: kind.to_string(),
                source: Box::new(e),
            })?;

        raws.sort_by(|a, b| a.name().cmp(b.name()));
        info!("Discovered {} {} definitions", raws.len(), kind);

        Ok(raws
            .iter()
            .map(|raw| {
                let normalized = CapabilityDefinition::from_raw(kind, raw);
                if let Err(e) = &normalized {
                    debug!("Definition {} did not normalize: {}", raw.name(), e);
                }
                normalized
            })
            .collect())
    }

    /// Fetch a single definition by name
    pub async fn get_definition(&self, kind: CapabilityKind, name: &str) -> Result<CapabilityDefinition> {
        let raw = self
            .cluster
            .get_definition(kind, name)
            .await
            .map_err(|e| VelaError::Registry {
                kind: kind.to_string(),
                source: Box::new(e),
            })?
            .ok_or_else(|| VelaError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })?;

        CapabilityDefinition::from_raw(kind, &raw)
    }
}
