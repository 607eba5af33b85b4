use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::error::InvalidAbiError;

/// A named, typed function parameter as it appears in ABI JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Param {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Param>,
}

impl Param {
    /// Canonical type as used in selectors, with tuples expanded.
    pub fn canonical_type(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(suffix) => {
                let inner: Vec<String> =
                    self.components.iter().map(Param::canonical_type).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            None => self.ty.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl StateMutability {
    /// `pure` and `view` functions only query chain state.
    pub fn is_read(self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }

    pub fn is_write(self) -> bool {
        !self.is_read()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub outputs: Vec<Param>,
    pub state_mutability: StateMutability,
}

impl FunctionEntry {
    /// `name(type1,type2)` form.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.inputs.iter().map(Param::canonical_type).collect();
        format!("{}({})", self.name, types.join(","))
    }

    pub fn is_payable(&self) -> bool {
        self.state_mutability == StateMutability::Payable
    }

    /// Label for the input at `index`, `param<N>` when the ABI leaves it unnamed.
    pub fn input_label(&self, index: usize) -> String {
        match self.inputs.get(index) {
            Some(param) if !param.name.is_empty() => param.name.clone(),
            _ => format!("param{}", index),
        }
    }
}

/// One item of an ABI document. Only functions are interpreted; the other
/// kinds are kept verbatim so the document survives within one session.
#[derive(Debug, Clone, PartialEq)]
pub enum AbiEntry {
    Function(FunctionEntry),
    Constructor(Value),
    Event(Value),
    Error(Value),
    Fallback(Value),
    Receive(Value),
}

impl AbiEntry {
    fn from_value(index: usize, value: Value) -> Result<Self, InvalidAbiError> {
        let entry_error = |reason: String| InvalidAbiError::Entry { index, reason };

        if !value.is_object() {
            return Err(entry_error("entry must be a JSON object".to_string()));
        }

        // Solidity treats a missing `type` as a function
        let kind = match value.get("type") {
            None => "function".to_string(),
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => return Err(entry_error(format!("invalid entry type {}", other))),
        };

        match kind.as_str() {
            "function" => {
                let function: FunctionEntry =
                    serde_json::from_value(value).map_err(|e| entry_error(e.to_string()))?;
                if function.name.trim().is_empty() {
                    return Err(entry_error("function name cannot be empty".to_string()));
                }
                Ok(Self::Function(function))
            }
            "constructor" => Ok(Self::Constructor(value)),
            "event" => Ok(Self::Event(value)),
            "error" => Ok(Self::Error(value)),
            "fallback" => Ok(Self::Fallback(value)),
            "receive" => Ok(Self::Receive(value)),
            other => Err(entry_error(format!("unknown entry type '{}'", other))),
        }
    }

    pub fn as_function(&self) -> Option<&FunctionEntry> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }
}

/// A parsed and validated ABI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AbiDocument {
    entries: Vec<AbiEntry>,
}

impl AbiDocument {
    /// Parse raw ABI text. Blank text yields `Ok(None)`.
    pub fn parse(raw: &str) -> Result<Option<Self>, InvalidAbiError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let value: Value =
            serde_json::from_str(raw).map_err(|e| InvalidAbiError::Json(e.to_string()))?;
        Self::from_value(value).map(Some)
    }

    /// Validate an already-decoded JSON value. Any bad entry rejects the
    /// whole document.
    pub fn from_value(value: Value) -> Result<Self, InvalidAbiError> {
        let Value::Array(items) = value else {
            return Err(InvalidAbiError::NotAnArray);
        };

        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| AbiEntry::from_value(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AbiEntry] {
        &self.entries
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionEntry> {
        self.entries.iter().filter_map(AbiEntry::as_function)
    }

    /// Split the functions into read and write groups, each tagged with the
    /// key used by the interaction store.
    pub fn classify(&self) -> Classification {
        let mut name_counts: HashMap<&str, usize> = HashMap::new();
        for function in self.functions() {
            *name_counts.entry(function.name.as_str()).or_default() += 1;
        }

        let mut classification = Classification::default();
        for function in self.functions() {
            // Overloads share a name, so each one is keyed by its full signature
            let key = if name_counts[function.name.as_str()] > 1 {
                function.signature()
            } else {
                function.name.clone()
            };

            let keyed = KeyedFunction {
                key,
                function: function.clone(),
            };
            if function.state_mutability.is_read() {
                classification.read.push(keyed);
            } else {
                classification.write.push(keyed);
            }
        }

        classification
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedFunction {
    pub key: String,
    pub function: FunctionEntry,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    pub read: Vec<KeyedFunction>,
    pub write: Vec<KeyedFunction>,
}

impl Classification {
    pub fn find(&self, key: &str) -> Option<&KeyedFunction> {
        self.read.iter().chain(&self.write).find(|f| f.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.read.iter().chain(&self.write).map(|f| f.key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

/// Holds the outcome of the most recent ABI text. Re-run on every edit.
#[derive(Debug, Clone, Default)]
pub struct AbiProcessor {
    document: Option<AbiDocument>,
    classification: Classification,
    error: Option<InvalidAbiError>,
}

impl AbiProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current state with the result of parsing `raw`.
    pub fn process(&mut self, raw: &str) -> Result<(), InvalidAbiError> {
        *self = Self::default();

        match AbiDocument::parse(raw) {
            Ok(Some(document)) => {
                self.classification = document.classify();
                debug!(
                    "Processed ABI: {} read, {} write functions",
                    self.classification.read.len(),
                    self.classification.write.len()
                );
                self.document = Some(document);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                debug!("Rejected ABI: {}", e);
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn document(&self) -> Option<&AbiDocument> {
        self.document.as_ref()
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn read_functions(&self) -> &[KeyedFunction] {
        &self.classification.read
    }

    pub fn write_functions(&self) -> &[KeyedFunction] {
        &self.classification.write
    }

    pub fn error(&self) -> Option<&InvalidAbiError> {
        self.error.as_ref()
    }

    pub fn find(&self, key: &str) -> Option<&KeyedFunction> {
        self.classification.find(key)
    }
}
