//! Reconciliation engine
//!
//! Composes descriptor building, rendering and invocation into the get/set
//! protocol for one resource type. Every call is one blocking round trip to
//! the interpreter; nothing is retried.

use crate::descriptor::{InvocationDescriptor, vendored_modules_path};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::mapper;
use crate::render::ScriptRenderer;
use crate::session::Invoker;
use crate::types::{
    Attributes, CanonicalResult, DesiredState, InvokeMethod, RawInvocationResult,
    ResourceTypeDefinition,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Attribute the engine uses for the desired presence of a resource
const DSC_ENSURE: &str = "dsc_ensure";

/// Reconciles instances of one resource type
pub struct Provider {
    definition: Arc<ResourceTypeDefinition>,
    renderer: Box<dyn ScriptRenderer>,
    invoker: Arc<dyn Invoker>,
    vendored_modules_path: PathBuf,
}

impl Provider {
    /// Create a provider for a resource type
    ///
    /// `install_root` is the adapter's installation directory; vendored
    /// resource modules are expected underneath it.
    pub fn new(
        definition: Arc<ResourceTypeDefinition>,
        renderer: Box<dyn ScriptRenderer>,
        invoker: Arc<dyn Invoker>,
        install_root: &Path,
    ) -> Self {
        Self {
            definition,
            renderer,
            invoker,
            vendored_modules_path: vendored_modules_path(install_root),
        }
    }

    /// Path passed to scripts for vendored resource modules
    pub fn vendored_modules_path(&self) -> &Path {
        &self.vendored_modules_path
    }

    /// Render the script for a desired state without executing it
    pub fn render(&self, desired: &DesiredState, method: InvokeMethod) -> Result<String> {
        let descriptor = InvocationDescriptor::build(
            &self.definition,
            desired,
            method,
            &self.vendored_modules_path,
        )?;
        self.renderer.render(&descriptor)
    }

    /// Read current state, one result per filter in input order
    ///
    /// Filters are processed sequentially. A failure is confined to its own
    /// entry.
    pub fn get(
        &self,
        diag: &dyn Diagnostics,
        filters: &[DesiredState],
    ) -> Vec<Result<CanonicalResult>> {
        filters.iter().map(|filter| self.get_one(diag, filter)).collect()
    }

    /// Read current state for a single filter
    pub fn get_one(&self, diag: &dyn Diagnostics, filter: &DesiredState) -> Result<CanonicalResult> {
        let name = filter.get("name").cloned().unwrap_or(Value::Null);
        diag.debug(&format!("retrieving {name} with {filter}"));

        let raw = self.invoke(diag, filter, InvokeMethod::Get)?;
        let result = mapper::canonicalize(raw.as_map(), &self.definition, name);

        diag.debug(&format!(
            "state: {}",
            Value::Object(result.clone())
        ));
        Ok(result)
    }

    /// Apply desired state
    ///
    /// A non-empty engine error message is reported on the diagnostic channel
    /// and the raw result is still returned, so the caller decides whether it
    /// is fatal.
    pub fn set(
        &self,
        diag: &dyn Diagnostics,
        name: &str,
        should: &DesiredState,
    ) -> Result<RawInvocationResult> {
        diag.debug(&format!("Invoking Set Method for '{name}' with {should}"));

        let raw = self.invoke(diag, should, InvokeMethod::Set)?;

        if let Some(message) = raw.error_message() {
            diag.err(message);
        }
        if raw.reboot_required() {
            log::warn!(
                "{} '{name}' requires a reboot to finish applying changes",
                self.definition.name
            );
        }
        Ok(raw)
    }

    /// Bring an absent resource to the desired state
    pub fn create(
        &self,
        diag: &dyn Diagnostics,
        name: &str,
        should: &DesiredState,
    ) -> Result<RawInvocationResult> {
        diag.debug(&format!("Creating '{name}'"));
        self.set(diag, name, should)
    }

    /// Converge an existing resource to the desired state
    pub fn update(
        &self,
        diag: &dyn Diagnostics,
        name: &str,
        should: &DesiredState,
    ) -> Result<RawInvocationResult> {
        diag.debug(&format!("Updating '{name}'"));
        self.set(diag, name, should)
    }

    /// Remove a resource identified only by name
    pub fn delete(&self, diag: &dyn Diagnostics, name: &str) -> Result<RawInvocationResult> {
        self.delete_matching(diag, name, &DesiredState::new())
    }

    /// Remove a resource, passing extra identity attributes to the engine
    ///
    /// Resources whose key properties go beyond the name need those keys in
    /// `identity`. Presence attributes in `identity`, in any casing or prefix
    /// form (`Ensure`, `DSC_Ensure`), are replaced.
    pub fn delete_matching(
        &self,
        diag: &dyn Diagnostics,
        name: &str,
        identity: &DesiredState,
    ) -> Result<RawInvocationResult> {
        diag.debug(&format!("Deleting '{name}'"));
        let should = self.absence_intent(name, identity);
        self.set(diag, name, &should)
    }

    fn absence_intent(&self, name: &str, identity: &DesiredState) -> DesiredState {
        let mut should: DesiredState = identity
            .iter()
            .filter(|(key, _)| mapper::canonical_key(key) != DSC_ENSURE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        should.insert("name", name);
        should.insert("ensure", "absent");
        if self.definition.declares(DSC_ENSURE) {
            should.insert(DSC_ENSURE, "Absent");
        }
        should
    }

    fn invoke(
        &self,
        diag: &dyn Diagnostics,
        desired: &DesiredState,
        method: InvokeMethod,
    ) -> Result<RawInvocationResult> {
        let script = self.render(desired, method)?;
        diag.debug(&format!("Script:\n {script}"));

        let output = self.invoker.execute(&script)?;
        let Some(stdout) = output.stdout_text() else {
            diag.err("Nothing returned");
            return Err(Error::EmptyOutput {
                resource: self.definition.resource_name.clone(),
                method: method.to_string(),
            });
        };

        parse_output(&self.definition.resource_name, stdout).map(RawInvocationResult::new)
    }
}

/// Decode interpreter stdout into a mapping
///
/// A JSON object is taken as is; a single-element array holding an object is
/// unwrapped. Anything else is malformed.
fn parse_output(resource: &str, stdout: &str) -> Result<Attributes> {
    let malformed = |message: String| Error::MalformedOutput {
        resource: resource.to_string(),
        message,
    };

    let value: Value = serde_json::from_str(stdout).map_err(|e| malformed(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(mut items) if items.len() == 1 => match items.pop() {
            Some(Value::Object(map)) => Ok(map),
            _ => Err(malformed("expected a JSON object in the array".to_string())),
        },
        other => Err(malformed(format!("expected a JSON object, got {}", json_kind(&other)))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
