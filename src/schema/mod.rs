// file: src/schema/mod.rs
// version: 1.0.0
// guid: caec5707-c2c7-4386-83cb-702ca967da0a

//! Parameter schema compilation
//!
//! Turns the parameter list of a capability definition into an ordered set of
//! command-line flags plus a [`Validator`] that binds raw flag values to typed
//! [`ParamValue`]s. Only the closed set of types in [`ParameterType`] is
//! supported; anything else makes the definition unsupported.

pub mod validator;

pub use validator::{FlagValues, Validator};

use crate::registry::{CapabilityDefinition, CapabilityKind};
use crate::{Result, VelaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Flag names owned by the root command or by the synthesized command itself
const RESERVED_FLAGS: &[&str] = &["help", "version", "verbose", "quiet", "config"];
const RESERVED_SHORTS: &[char] = &['h', 'V', 'v', 'q'];

/// Workload commands take the target application as `-a/--app`
const WORKLOAD_RESERVED_FLAGS: &[&str] = &["app"];
const WORKLOAD_RESERVED_SHORTS: &[char] = &['a'];

/// Supported parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterType {
    String,
    Int,
    Bool,
    StringList,
}

impl ParameterType {
    /// Parse a declared type tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Some(Self::String),
            "int" | "integer" => Some(Self::Int),
            "bool" | "boolean" => Some(Self::Bool),
            "string-list" | "[]string" | "stringlist" => Some(Self::StringList),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::StringList => "string-list",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
    StrList(Vec<String>),
}

impl ParamValue {
    pub fn kind(&self) -> ParameterType {
        match self {
            Self::Bool(_) => ParameterType::Bool,
            Self::Int(_) => ParameterType::Int,
            Self::Str(_) => ParameterType::String,
            Self::StrList(_) => ParameterType::StringList,
        }
    }

    /// Coerce a JSON default into a value of the declared type
    pub fn from_json(kind: ParameterType, value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match (kind, value) {
            (ParameterType::String, Value::String(s)) => Some(Self::Str(s.clone())),
            (ParameterType::Int, Value::Number(n)) => n.as_i64().map(Self::Int),
            (ParameterType::Bool, Value::Bool(b)) => Some(Self::Bool(*b)),
            (ParameterType::StringList, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Self::StrList),
            (ParameterType::StringList, Value::String(s)) => Some(Self::StrList(split_list(s))),
            _ => None,
        }
    }

    /// Render the value the way it would be typed on the command line
    pub fn to_flag_value(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Str(s) => s.clone(),
            Self::StrList(items) => items.join(","),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_flag_value())
    }
}

/// Parameter name to bound value
pub type ParameterBindings = BTreeMap<String, ParamValue>;

/// Human-readable `name=value` list
pub fn describe_bindings(bindings: &ParameterBindings) -> String {
    bindings
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// One compiled command-line flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    pub short: Option<char>,
    pub kind: ParameterType,
    /// Required and without a default
    pub mandatory: bool,
    pub default: Option<ParamValue>,
    pub help: String,
}

/// Flags and validator for one definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSchema {
    pub definition: String,
    pub flags: Vec<FlagSpec>,
    pub validator: Validator,
}

impl CompiledSchema {
    pub fn flag(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|flag| flag.name == name)
    }
}

/// Compiles definition parameter schemas into flag specifications
#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler;

impl SchemaCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile the parameters of a definition, preserving declaration order
    pub fn compile(&self, definition: &CapabilityDefinition) -> Result<CompiledSchema> {
        debug!(
            "Compiling {} parameters for {} {}",
            definition.parameters.len(),
            definition.kind,
            definition.name
        );

        let mut flags = Vec::with_capacity(definition.parameters.len());

        for param in &definition.parameters {
            let kind = ParameterType::from_tag(&param.type_tag).ok_or_else(|| {
                VelaError::schema_unsupported(
                    &definition.name,
                    &param.name,
                    format!("unsupported type '{}'", param.type_tag),
                )
            })?;

            check_reserved(definition, &param.name, param.short)?;

            let default = match &param.default {
                None | Some(serde_json::Value::Null) => None,
                Some(raw) => Some(ParamValue::from_json(kind, raw).ok_or_else(|| {
                    VelaError::definition_invalid(
                        &definition.name,
                        format!(
                            "default {} of parameter {} is not a valid {}",
                            raw, param.name, kind
                        ),
                    )
                })?),
            };

            flags.push(FlagSpec {
                name: param.name.clone(),
                short: param.short,
                kind,
                mandatory: param.required && default.is_none(),
                default,
                help: param.usage.clone(),
            });
        }

        Ok(CompiledSchema {
            definition: definition.name.clone(),
            validator: Validator::new(definition.name.clone(), flags.clone()),
            flags,
        })
    }
}

fn check_reserved(
    definition: &CapabilityDefinition,
    name: &str,
    short: Option<char>,
) -> Result<()> {
    let workload = definition.kind == CapabilityKind::Workload;

    let reserved_name = RESERVED_FLAGS.contains(&name)
        || (workload && WORKLOAD_RESERVED_FLAGS.contains(&name));
    if reserved_name {
        return Err(VelaError::schema_unsupported(
            &definition.name,
            name,
            format!("--{} is reserved by the command line", name),
        ));
    }

    if let Some(short) = short {
        let reserved_short = RESERVED_SHORTS.contains(&short)
            || (workload && WORKLOAD_RESERVED_SHORTS.contains(&short));
        if reserved_short {
            return Err(VelaError::schema_unsupported(
                &definition.name,
                name,
                format!("-{} is reserved by the command line", short),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ParameterDecl, TemplateRef};
    use serde_json::json;

    fn param(name: &str, type_tag: &str) -> ParameterDecl {
        ParameterDecl {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            required: false,
            default: None,
            usage: String::new(),
            short: None,
        }
    }

    fn definition(kind: CapabilityKind, name: &str, parameters: Vec<ParameterDecl>) -> CapabilityDefinition {
        CapabilityDefinition {
            kind,
            name: name.to_string(),
            description: None,
            parameters,
            template: TemplateRef {
                resource: format!("{}.core.oam.dev", name),
                template: None,
            },
            applies_to: Vec::new(),
        }
    }

    #[test]
    fn test_compile_scaler_with_default() {
        // Arrange
        let mut replicas = param("replicas", "int");
        replicas.default = Some(json!(1));
        replicas.usage = "Number of replicas".to_string();
        let def = definition(CapabilityKind::Trait, "scaler", vec![replicas]);

        // Act
        let compiled = SchemaCompiler::new().compile(&def).unwrap();

        // Assert
        assert_eq!(compiled.flags.len(), 1);
        let flag = compiled.flag("replicas").unwrap();
        assert_eq!(flag.kind, ParameterType::Int);
        assert_eq!(flag.default, Some(ParamValue::Int(1)));
        assert!(!flag.mandatory);
        assert_eq!(flag.help, "Number of replicas");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let mut image = param("image", "string");
        image.required = true;
        let mut ports = param("ports", "[]string");
        ports.default = Some(json!(["80", "443"]));
        let def = definition(
            CapabilityKind::Workload,
            "containerized",
            vec![image, ports, param("debug", "bool")],
        );
        let compiler = SchemaCompiler::new();

        let first = compiler.compile(&def).unwrap();
        let second = compiler.compile(&def).unwrap();

        assert_eq!(first, second);
        let names: Vec<_> = first.flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["image", "ports", "debug"]);
    }

    #[test]
    fn test_required_without_default_is_mandatory() {
        let mut image = param("image", "string");
        image.required = true;
        let mut port = param("port", "int");
        port.required = true;
        port.default = Some(json!(8080));
        let def = definition(CapabilityKind::Workload, "containerized", vec![image, port]);

        let compiled = SchemaCompiler::new().compile(&def).unwrap();

        assert!(compiled.flag("image").unwrap().mandatory);
        assert!(!compiled.flag("port").unwrap().mandatory);
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        let def = definition(CapabilityKind::Trait, "bad", vec![param("x", "unsupported-type")]);

        let err = SchemaCompiler::new().compile(&def).unwrap_err();

        assert!(matches!(err, VelaError::SchemaUnsupported { ref parameter, .. } if parameter == "x"));
        assert!(err.is_definition_level());
    }

    #[test]
    fn test_reserved_flag_names() {
        let trait_def = definition(CapabilityKind::Trait, "route", vec![param("app", "string")]);
        let workload_def = definition(CapabilityKind::Workload, "task", vec![param("app", "string")]);
        let verbose_def = definition(CapabilityKind::Trait, "logs", vec![param("verbose", "bool")]);

        let compiler = SchemaCompiler::new();

        assert!(compiler.compile(&trait_def).is_ok());
        assert!(matches!(
            compiler.compile(&workload_def),
            Err(VelaError::SchemaUnsupported { .. })
        ));
        assert!(matches!(
            compiler.compile(&verbose_def),
            Err(VelaError::SchemaUnsupported { .. })
        ));
    }

    #[test]
    fn test_reserved_short_flag() {
        let mut replicas = param("replicas", "int");
        replicas.short = Some('v');
        let def = definition(CapabilityKind::Trait, "scaler", vec![replicas]);

        let err = SchemaCompiler::new().compile(&def).unwrap_err();

        assert!(err.to_string().contains("-v is reserved"));
    }

    #[test]
    fn test_default_of_wrong_type_invalidates_definition() {
        let mut replicas = param("replicas", "int");
        replicas.default = Some(json!("three"));
        let def = definition(CapabilityKind::Trait, "scaler", vec![replicas]);

        let err = SchemaCompiler::new().compile(&def).unwrap_err();

        assert!(matches!(err, VelaError::DefinitionInvalid { ref name, .. } if name == "scaler"));
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(ParameterType::from_tag("int"), Some(ParameterType::Int));
        assert_eq!(ParameterType::from_tag("Boolean"), Some(ParameterType::Bool));
        assert_eq!(ParameterType::from_tag("[]string"), Some(ParameterType::StringList));
        assert_eq!(ParameterType::from_tag("float"), None);
    }

    #[test]
    fn test_param_value_serialization() {
        let mut bindings = ParameterBindings::new();
        bindings.insert("replicas".to_string(), ParamValue::Int(3));
        bindings.insert("hosts".to_string(), ParamValue::StrList(vec!["a".into(), "b".into()]));

        let json = serde_json::to_value(&bindings).unwrap();
        assert_eq!(json, json!({"hosts": ["a", "b"], "replicas": 3}));

        let back: ParameterBindings = serde_json::from_value(json).unwrap();
        assert_eq!(back, bindings);
        assert_eq!(describe_bindings(&back), "hosts=a,b, replicas=3");
    }
}
