pub mod delete;
pub mod get;
pub mod render;
pub mod set;
pub mod types;

use crate::Context;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use dsckit::{DesiredState, Diagnostics, Provider, ResourceTypeDefinition, TemplateRenderer};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Diagnostics for the terminal: debug records to the log, errors to the user
pub struct CliDiagnostics;

impl Diagnostics for CliDiagnostics {
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn err(&self, message: &str) {
        ui::error(message);
    }
}

/// Load a resource type definition file
pub fn load_type(path: &Path) -> Result<Arc<ResourceTypeDefinition>> {
    let definition = ResourceTypeDefinition::load(path)
        .with_context(|| format!("Could not load resource type from {}", path.display()))?;
    Ok(Arc::new(definition))
}

/// Build a provider for a type file, wired to the shared session
pub fn provider(ctx: &Context, type_file: &Path) -> Result<Provider> {
    let definition = load_type(type_file)?;
    let templates = ctx.config.templates()?;
    let install_root = ctx.config.install_root()?;
    log::debug!("Install root: {}", install_root.display());

    Ok(Provider::new(
        definition,
        Box::new(TemplateRenderer::with_templates(templates)),
        ctx.session.clone(),
        &install_root,
    ))
}

/// Parse one `key=value` argument; the value is JSON when it parses as JSON
pub fn parse_attr(arg: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("Invalid attribute '{arg}': expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid attribute '{arg}': empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Parse `key=value` arguments into a desired state
pub fn parse_attrs(args: &[String]) -> Result<DesiredState> {
    args.iter().map(|arg| parse_attr(arg)).collect()
}

/// Desired state for a named resource from `key=value` arguments
pub fn desired_state(name: &str, args: &[String]) -> Result<DesiredState> {
    let mut desired = parse_attrs(args)?;
    desired.insert("name", name);
    Ok(desired)
}
