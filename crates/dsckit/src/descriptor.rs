//! Invocation descriptors - the input to script rendering

use crate::error::Result;
use crate::mapper;
use crate::types::{DesiredState, InvokeMethod, ResourceTypeDefinition};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory holding vendored DSC resource modules, relative to the install root
pub const VENDORED_MODULES_DIR: &str = "dsc_resources";

/// Location of the vendored resource modules for an installation root
pub fn vendored_modules_path(install_root: &Path) -> PathBuf {
    install_root.join(VENDORED_MODULES_DIR)
}

/// One DSC parameter: the desired value plus its MOF metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub value: Value,
    pub mof_type: String,
    /// Carried through untouched; only the renderer interprets it
    pub mof_is_embedded: bool,
}

/// Everything a script template needs for one invocation
///
/// Built fresh for each call and discarded once the script is rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationDescriptor {
    /// Host-side type name
    pub name: String,
    pub friendly_name: String,
    pub resource_name: String,
    pub module_name: String,
    pub module_version: String,
    /// DSC parameters keyed by the original attribute name
    pub parameters: BTreeMap<String, Parameter>,
    pub invoke_method: InvokeMethod,
    pub vendored_modules_path: PathBuf,
    /// Always null; kept so older templates that reference it still render
    pub attributes: Option<Value>,
}

impl InvocationDescriptor {
    /// Build a descriptor from a type definition and desired state
    pub fn build(
        definition: &ResourceTypeDefinition,
        desired: &DesiredState,
        invoke_method: InvokeMethod,
        vendored_modules_path: &Path,
    ) -> Result<Self> {
        Ok(Self {
            name: definition.name.clone(),
            friendly_name: definition.friendly_name.clone(),
            resource_name: definition.resource_name.clone(),
            module_name: definition.module_name.clone(),
            module_version: definition.module_version.clone(),
            parameters: mapper::to_parameters(definition, desired)?,
            invoke_method,
            vendored_modules_path: vendored_modules_path.to_path_buf(),
            attributes: None,
        })
    }
}
