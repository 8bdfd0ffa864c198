//! Script rendering
//!
//! A script is three template fragments (preamble, invoke body, postscript)
//! concatenated and rendered against an [`InvocationDescriptor`]. The
//! built-in fragments ship with the crate; a directory holding files with the
//! same names can replace them.

use crate::descriptor::{InvocationDescriptor, Parameter};
use crate::error::{Error, Result};
use crate::mapper::ATTRIBUTE_PREFIX;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

const SCRIPT_TEMPLATE: &str = "invoke_dsc_resource.ps1";

/// File names of the three fragments, in concatenation order
pub const FRAGMENT_FILES: [&str; 3] = ["preamble.ps1", "invoke.ps1", "postscript.ps1"];

/// Turns a descriptor into script text
///
/// Implementations must be pure: the same descriptor always renders the
/// same script.
pub trait ScriptRenderer: Send + Sync {
    /// Render the script for one invocation
    fn render(&self, descriptor: &InvocationDescriptor) -> Result<String>;
}

/// The three template fragments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    pub preamble: String,
    pub body: String,
    pub postscript: String,
}

impl TemplateSet {
    /// Fragments compiled into the crate
    pub fn builtin() -> Self {
        Self {
            preamble: include_str!("../templates/preamble.ps1").to_string(),
            body: include_str!("../templates/invoke.ps1").to_string(),
            postscript: include_str!("../templates/postscript.ps1").to_string(),
        }
    }

    /// Read fragments from a directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |file: &str| {
            let path = dir.join(file);
            std::fs::read_to_string(&path).map_err(|e| Error::io(path, e))
        };
        let [preamble, body, postscript] = FRAGMENT_FILES;
        Ok(Self {
            preamble: read(preamble)?,
            body: read(body)?,
            postscript: read(postscript)?,
        })
    }

    fn source(&self) -> String {
        format!("{}{}{}", self.preamble, self.body, self.postscript)
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Renderer backed by minijinja templates
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    templates: TemplateSet,
}

impl TemplateRenderer {
    /// Renderer using the built-in fragments
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer using custom fragments
    pub fn with_templates(templates: TemplateSet) -> Self {
        Self { templates }
    }
}

impl ScriptRenderer for TemplateRenderer {
    fn render(&self, descriptor: &InvocationDescriptor) -> Result<String> {
        let source = self.templates.source();

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.add_filter("psquote", psquote_filter);
        env.add_template(SCRIPT_TEMPLATE, &source)?;

        let template = env.get_template(SCRIPT_TEMPLATE)?;
        Ok(template.render(RenderContext::new(descriptor))?)
    }
}

/// Template context: the descriptor plus pre-rendered PowerShell literals
#[derive(Serialize)]
struct RenderContext<'a> {
    #[serde(flatten)]
    descriptor: &'a InvocationDescriptor,
    properties: Vec<RenderedProperty>,
}

#[derive(Serialize)]
struct RenderedProperty {
    name: String,
    literal: String,
    mof_type: String,
    mof_is_embedded: bool,
}

impl<'a> RenderContext<'a> {
    fn new(descriptor: &'a InvocationDescriptor) -> Self {
        let properties = descriptor
            .parameters
            .iter()
            .map(|(key, parameter)| RenderedProperty {
                name: property_name(key),
                literal: parameter_literal(parameter),
                mof_type: parameter.mof_type.clone(),
                mof_is_embedded: parameter.mof_is_embedded,
            })
            .collect();
        Self {
            descriptor,
            properties,
        }
    }
}

/// DSC property name for an attribute key (`dsc_destinationpath` -> `destinationpath`)
pub fn property_name(key: &str) -> String {
    let prefix_len = ATTRIBUTE_PREFIX.len();
    match key.get(..prefix_len) {
        Some(head) if head.eq_ignore_ascii_case(ATTRIBUTE_PREFIX) && key.len() > prefix_len => {
            key[prefix_len..].to_string()
        }
        _ => key.to_string(),
    }
}

fn parameter_literal(parameter: &Parameter) -> String {
    if !parameter.mof_is_embedded {
        return ps_literal(&parameter.value);
    }

    let class_name = parameter.mof_type.trim_end_matches("[]");
    let instance = |value: &Value| {
        format!(
            "(New-DscEmbeddedInstance -ClassName {} -Property {})",
            ps_quote(class_name),
            ps_literal(value)
        )
    };

    match &parameter.value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(instance).collect();
            format!("@({})", items.join(", "))
        }
        Value::Null => "$null".to_string(),
        other => instance(other),
    }
}

/// Render a JSON value as a PowerShell literal
pub fn ps_literal(value: &Value) -> String {
    match value {
        Value::Null => "$null".to_string(),
        Value::Bool(true) => "$true".to_string(),
        Value::Bool(false) => "$false".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => ps_quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(ps_literal).collect();
            format!("@({})", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{} = {}", ps_quote(k), ps_literal(v)))
                .collect();
            format!("@{{{}}}", entries.join("; "))
        }
    }
}

/// Single-quote a string for PowerShell
///
/// PowerShell treats the typographic quotes U+2018..U+201B as single quotes
/// too, so every one of them is doubled.
pub fn ps_quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            quoted.push(c);
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn psquote_filter(value: String) -> String {
    ps_quote(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeSpec, DesiredState, InvokeMethod, ResourceTypeDefinition};
    use serde_json::json;

    fn descriptor(desired: &DesiredState, method: InvokeMethod) -> InvocationDescriptor {
        let mut definition =
            ResourceTypeDefinition::new("dsc_file", "File", "PSDscResources", "2.12.0.0")
                .with_attribute("dsc_destinationpath", AttributeSpec::new("String", "String"))
                .with_attribute("dsc_ensure", AttributeSpec::new("Enum['Present']", "String"))
                .with_attribute(
                    "dsc_credential",
                    AttributeSpec::new("Optional[Struct[{}]]", "MSFT_Credential").embedded(),
                );
        definition.resource_name = "File".to_string();
        InvocationDescriptor::build(&definition, desired, method, Path::new("C:\\dscbridge\\dsc_resources"))
            .unwrap()
    }

    #[test]
    fn test_ps_quote() {
        assert_eq!(ps_quote("plain"), "'plain'");
        assert_eq!(ps_quote("it's"), "'it''s'");
        assert_eq!(ps_quote("a\u{2019}b"), "'a\u{2019}\u{2019}b'");
        assert_eq!(ps_quote(""), "''");
    }

    #[test]
    fn test_ps_literal() {
        assert_eq!(ps_literal(&json!(null)), "$null");
        assert_eq!(ps_literal(&json!(true)), "$true");
        assert_eq!(ps_literal(&json!(false)), "$false");
        assert_eq!(ps_literal(&json!(42)), "42");
        assert_eq!(ps_literal(&json!(["a", 1])), "@('a', 1)");
        assert_eq!(ps_literal(&json!([])), "@()");
        assert_eq!(ps_literal(&json!({ "k": "v" })), "@{'k' = 'v'}");
    }

    #[test]
    fn test_property_name() {
        assert_eq!(property_name("dsc_destinationpath"), "destinationpath");
        assert_eq!(property_name("DSC_Path"), "Path");
        assert_eq!(property_name("path"), "path");
        assert_eq!(property_name("dsc_"), "dsc_");
    }

    #[test]
    fn test_embedded_literal() {
        let parameter = Parameter {
            value: json!({ "user": "admin", "password": "secret" }),
            mof_type: "MSFT_Credential".to_string(),
            mof_is_embedded: true,
        };
        assert_eq!(
            parameter_literal(&parameter),
            "(New-DscEmbeddedInstance -ClassName 'MSFT_Credential' -Property @{'password' = 'secret'; 'user' = 'admin'})"
        );
    }

    #[test]
    fn test_embedded_array_literal() {
        let parameter = Parameter {
            value: json!([{ "key": "a" }, { "key": "b" }]),
            mof_type: "MSFT_KeyValuePair[]".to_string(),
            mof_is_embedded: true,
        };
        let literal = parameter_literal(&parameter);
        assert!(literal.starts_with("@((New-DscEmbeddedInstance -ClassName 'MSFT_KeyValuePair'"));
        assert_eq!(literal.matches("New-DscEmbeddedInstance").count(), 2);
    }

    #[test]
    fn test_render_builtin_script() {
        let desired = DesiredState::named("x")
            .with("dsc_destinationpath", "C:\\it's\\here")
            .with("ensure", "present");
        let script = TemplateRenderer::new()
            .render(&descriptor(&desired, InvokeMethod::Set))
            .unwrap();

        assert!(script.contains("Name       = 'File'"));
        assert!(script.contains("Method     = 'set'"));
        assert!(script.contains("ModuleName    = 'PSDscResources'"));
        assert!(script.contains("ModuleVersion = '2.12.0.0'"));
        assert!(script.contains("'destinationpath' = 'C:\\it''s\\here'"));
        assert!(script.contains("$script:DscModulePath = 'C:\\dscbridge\\dsc_resources'"));
        assert!(script.contains("ConvertTo-Json -Depth 10 -Compress"));
        assert!(script.contains("Invoke-DscResource @InvokeParams 6>$null"));
        assert!(!script.contains("'ensure'"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let desired = DesiredState::named("x").with("dsc_destinationpath", "/tmp/a");
        let renderer = TemplateRenderer::new();
        let descriptor = descriptor(&desired, InvokeMethod::Get);
        assert_eq!(
            renderer.render(&descriptor).unwrap(),
            renderer.render(&descriptor).unwrap()
        );
    }

    #[test]
    fn test_render_custom_templates() {
        let templates = TemplateSet {
            preamble: "# {{ friendly_name }}\n".to_string(),
            body: "{% for property in properties %}{{ property.name }}={{ property.literal }}\n{% endfor %}"
                .to_string(),
            postscript: "{{ invoke_method }}".to_string(),
        };
        let desired = DesiredState::named("x").with("dsc_destinationpath", "/tmp/a");
        let script = TemplateRenderer::with_templates(templates)
            .render(&descriptor(&desired, InvokeMethod::Get))
            .unwrap();
        assert_eq!(script, "# File\ndestinationpath='/tmp/a'\nget");
    }

    #[test]
    fn test_render_undefined_variable_fails() {
        let templates = TemplateSet {
            preamble: String::new(),
            body: "{{ no_such_field }}".to_string(),
            postscript: String::new(),
        };
        let err = TemplateRenderer::with_templates(templates)
            .render(&descriptor(&DesiredState::named("x"), InvokeMethod::Get))
            .unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[test]
    fn test_templates_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        for (file, content) in FRAGMENT_FILES.iter().zip(["a", "b", "c"]) {
            std::fs::write(dir.path().join(file), content).unwrap();
        }
        let templates = TemplateSet::from_dir(dir.path()).unwrap();
        assert_eq!(templates.source(), "abc");
    }

    #[test]
    fn test_templates_from_dir_missing_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateSet::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
