// file: src/schema/validator.rs
// version: 1.0.0
// guid: 16029da1-8f2c-44f7-ae24-87f26f5bee73

//! Binding of raw flag values to typed parameters

use super::{split_list, FlagSpec, ParamValue, ParameterBindings, ParameterType};
use crate::{Result, VelaError};
use std::collections::BTreeMap;

/// Raw flag values keyed by flag name, as collected from the command line or
/// supplied programmatically
pub type FlagValues = BTreeMap<String, Vec<String>>;

/// Validates raw flag values against a compiled schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    command: String,
    flags: Vec<FlagSpec>,
}

impl Validator {
    pub fn new(command: impl Into<String>, flags: Vec<FlagSpec>) -> Self {
        Self {
            command: command.into(),
            flags,
        }
    }

    /// Validator for commands that accept no parameters
    pub fn empty(command: impl Into<String>) -> Self {
        Self::new(command, Vec::new())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Coerce values, apply defaults and check mandatory parameters
    pub fn validate(&self, values: &FlagValues) -> Result<ParameterBindings> {
        if let Some(unknown) = values
            .keys()
            .find(|key| !self.flags.iter().any(|flag| &flag.name == *key))
        {
            return Err(VelaError::UnknownParameter {
                command: self.command.clone(),
                parameter: unknown.clone(),
            });
        }

        let mut bindings = ParameterBindings::new();
        let mut missing = Vec::new();

        for flag in &self.flags {
            match values.get(&flag.name).filter(|raw| !raw.is_empty()) {
                Some(raw) => {
                    let value = self.coerce(flag, raw)?;
                    bindings.insert(flag.name.clone(), value);
                }
                None => match &flag.default {
                    Some(default) => {
                        bindings.insert(flag.name.clone(), default.clone());
                    }
                    None if flag.mandatory => missing.push(format!("--{}", flag.name)),
                    None => {}
                },
            }
        }

        if !missing.is_empty() {
            return Err(VelaError::validation(format!(
                "{}: missing required parameter(s): {}",
                self.command,
                missing.join(", ")
            )));
        }

        Ok(bindings)
    }

    fn coerce(&self, flag: &FlagSpec, raw: &[String]) -> Result<ParamValue> {
        match flag.kind {
            ParameterType::StringList => Ok(ParamValue::StrList(
                raw.iter().flat_map(|item| split_list(item)).collect(),
            )),
            ParameterType::String => Ok(ParamValue::Str(self.single(flag, raw)?.clone())),
            ParameterType::Int => {
                let single = self.single(flag, raw)?;
                single.trim().parse::<i64>().map(ParamValue::Int).map_err(|_| {
                    VelaError::validation(format!(
                        "{}: --{} expects an integer, got '{}'",
                        self.command, flag.name, single
                    ))
                })
            }
            ParameterType::Bool => {
                let single = self.single(flag, raw)?;
                match single.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(ParamValue::Bool(true)),
                    "false" => Ok(ParamValue::Bool(false)),
                    _ => Err(VelaError::validation(format!(
                        "{}: --{} expects true or false, got '{}'",
                        self.command, flag.name, single
                    ))),
                }
            }
        }
    }

    fn single<'a>(&self, flag: &FlagSpec, raw: &'a [String]) -> Result<&'a String> {
        match raw {
            [single] => Ok(single),
            _ => Err(VelaError::validation(format!(
                "{}: --{} accepts a single value, got {}",
                self.command,
                flag.name,
                raw.len()
            ))),
        }
    }
}
