//! Core types for DSC resource reconciliation

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Untyped attribute mapping, as exchanged with the DSC engine
pub type Attributes = serde_json::Map<String, Value>;

/// Attribute mapping restricted to declared attributes, in canonical form
pub type CanonicalResult = Attributes;

/// Which script variant runs in the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeMethod {
    /// Read current state
    Get,
    /// Apply desired state
    Set,
}

impl InvokeMethod {
    /// The verb passed to `Invoke-DscResource -Method`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
        }
    }
}

impl fmt::Display for InvokeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared metadata for one attribute of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Canonical value type, e.g. `Optional[Enum['Present', 'Absent']]`
    #[serde(rename = "type")]
    pub value_type: String,
    /// MOF type understood by the DSC engine, e.g. `String` or `MSFT_Credential`
    #[serde(default)]
    pub mof_type: String,
    /// Whether the value is an embedded CIM instance
    #[serde(default)]
    pub mof_is_embedded: bool,
}

impl AttributeSpec {
    /// Create a plain (non-embedded) attribute spec
    pub fn new(value_type: impl Into<String>, mof_type: impl Into<String>) -> Self {
        Self {
            value_type: value_type.into(),
            mof_type: mof_type.into(),
            mof_is_embedded: false,
        }
    }

    /// Mark the attribute as an embedded instance
    pub fn embedded(mut self) -> Self {
        self.mof_is_embedded = true;
        self
    }

    /// Whether the declared type is an enumeration
    pub fn is_enum(&self) -> bool {
        self.value_type.contains("Enum")
    }
}

/// Static schema for one resource kind
///
/// Loaded once per resource kind and shared read-only across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeDefinition {
    /// Host-side type name, e.g. `dsc_file`
    pub name: String,
    /// DSC friendly name, e.g. `File`
    pub friendly_name: String,
    /// DSC resource class name, e.g. `MSFT_FileDirectoryConfiguration`
    pub resource_name: String,
    /// PowerShell module providing the resource
    pub module_name: String,
    /// Module version to load
    pub module_version: String,
    /// Declared attributes keyed by canonical name
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSpec>,
}

impl ResourceTypeDefinition {
    /// Create a definition with no attributes
    pub fn new(
        name: impl Into<String>,
        friendly_name: impl Into<String>,
        module_name: impl Into<String>,
        module_version: impl Into<String>,
    ) -> Self {
        let friendly_name = friendly_name.into();
        Self {
            name: name.into(),
            resource_name: friendly_name.clone(),
            friendly_name,
            module_name: module_name.into(),
            module_version: module_version.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.attributes.insert(name.into(), spec);
        self
    }

    /// Look up an attribute by its exact declared name
    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.get(name)
    }

    /// Whether an attribute with this exact name is declared
    pub fn declares(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Parse a definition from TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let definition: Self = toml::from_str(content).map_err(|e| Error::Schema(e.to_string()))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Parse a definition from JSON
    pub fn from_json_str(content: &str) -> Result<Self> {
        let definition: Self =
            serde_json::from_str(content).map_err(|e| Error::Schema(e.to_string()))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load a definition from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let definition = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
        .map_err(|e| match e {
            Error::Schema(message) => Error::Schema(format!("{}: {message}", path.display())),
            other => other,
        })?;
        log::debug!(
            "Loaded resource type {} ({} attributes) from {}",
            definition.name,
            definition.attributes.len(),
            path.display()
        );
        Ok(definition)
    }

    /// Check that every DSC parameter attribute carries a MOF type
    pub fn validate(&self) -> Result<()> {
        if self.resource_name.trim().is_empty() {
            return Err(Error::Schema(format!(
                "resource type {} has no resource name",
                self.name
            )));
        }
        for (name, spec) in &self.attributes {
            if crate::mapper::is_structural(name) {
                continue;
            }
            if spec.mof_type.trim().is_empty() {
                return Err(Error::Schema(format!(
                    "attribute {name} of {} has no mof_type",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Desired state for one resource instance, supplied per call by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState(Attributes);

impl DesiredState {
    /// Create an empty desired state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a desired state carrying only a name
    pub fn named(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self::new().with("name", name)
    }

    /// Set an attribute (builder style)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set an attribute
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get an attribute value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `name` identity attribute, if present
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Iterate over attributes
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying mapping
    pub fn as_map(&self) -> &Attributes {
        &self.0
    }
}

impl From<Attributes> for DesiredState {
    fn from(map: Attributes) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for DesiredState {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// Untyped result decoded from interpreter stdout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawInvocationResult(Attributes);

impl RawInvocationResult {
    /// Wrap a decoded mapping
    pub fn new(map: Attributes) -> Self {
        Self(map)
    }

    /// The engine-reported error message, when non-empty
    pub fn error_message(&self) -> Option<&str> {
        self.0
            .get("errormessage")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    /// Whether the engine asked for a reboot
    pub fn reboot_required(&self) -> bool {
        self.0
            .get("rebootrequired")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Get a raw field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying mapping
    pub fn as_map(&self) -> &Attributes {
        &self.0
    }
}

/// Captured output of one script execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Captured stdout; `None` when the script wrote nothing
    pub stdout: Option<String>,
    /// Captured stderr; `None` when the script wrote nothing
    pub stderr: Option<String>,
}

impl ExecutionOutput {
    /// Output with the given stdout and no stderr
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: Some(stdout.into()),
            stderr: None,
        }
    }

    /// Stdout with surrounding whitespace removed, or `None` if blank
    pub fn stdout_text(&self) -> Option<&str> {
        self.stdout
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
