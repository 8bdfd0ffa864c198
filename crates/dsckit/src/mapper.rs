//! Attribute mapping between the typed schema and the DSC engine
//!
//! Forward: desired state -> invocation parameters carrying MOF metadata.
//! Reverse: raw engine output -> canonical result keyed by declared names.

use crate::descriptor::Parameter;
use crate::error::{Error, Result};
use crate::types::{CanonicalResult, DesiredState, ResourceTypeDefinition};
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix carried by every canonical attribute name
pub const ATTRIBUTE_PREFIX: &str = "dsc_";

/// Identity attributes owned by the host, never passed to DSC
pub const STRUCTURAL_KEYS: [&str; 2] = ["name", "ensure"];

/// Whether a key is a structural identity attribute
pub fn is_structural(key: &str) -> bool {
    STRUCTURAL_KEYS.contains(&key)
}

/// Canonical form of an attribute key: `dsc_` + lowercase key.
///
/// Defined for any string. Keys that already carry the prefix (in any case)
/// are only lowercased, so applying this twice is the same as applying it
/// once. Expected input is an ASCII identifier such as `DestinationPath`.
pub fn canonical_key(key: &str) -> String {
    let lower = key.to_lowercase();
    if lower.starts_with(ATTRIBUTE_PREFIX) {
        lower
    } else {
        format!("{ATTRIBUTE_PREFIX}{lower}")
    }
}

/// Translate desired state into invocation parameters.
///
/// Every key except `name` and `ensure` yields one parameter keyed by the
/// original attribute name. Metadata is looked up by the key as given, then
/// by its canonical form. Keys sharing a canonical form (`path`, `Path`,
/// `dsc_path`) would become duplicate DSC properties and are rejected.
pub fn to_parameters(
    definition: &ResourceTypeDefinition,
    desired: &DesiredState,
) -> Result<BTreeMap<String, Parameter>> {
    let mut parameters = BTreeMap::new();
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();

    for (key, value) in desired.iter() {
        if is_structural(key) {
            continue;
        }

        if let Some(first) = seen.insert(canonical_key(key), key) {
            return Err(Error::DuplicateAttribute {
                resource: definition.name.clone(),
                first: first.to_string(),
                second: key.clone(),
            });
        }

        let spec = definition
            .attribute(key)
            .or_else(|| definition.attribute(&canonical_key(key)))
            .ok_or_else(|| Error::UnknownAttribute {
                resource: definition.name.clone(),
                attribute: key.clone(),
            })?;

        parameters.insert(
            key.clone(),
            Parameter {
                value: value.clone(),
                mof_type: spec.mof_type.clone(),
                mof_is_embedded: spec.mof_is_embedded,
            },
        );
    }

    Ok(parameters)
}

/// Translate raw engine output into a canonical result.
///
/// Undeclared keys are dropped, survivors are renamed to their canonical
/// form, textual values of enumerated attributes are lowercased, and the
/// identity attributes `ensure: present` and `name` are merged in.
pub fn canonicalize(
    raw: &serde_json::Map<String, Value>,
    definition: &ResourceTypeDefinition,
    name: Value,
) -> CanonicalResult {
    let mut result = CanonicalResult::new();

    for (key, value) in raw {
        let type_key = canonical_key(key);
        let Some(spec) = definition.attribute(&type_key) else {
            continue;
        };

        let value = match value {
            Value::String(s) if spec.is_enum() => Value::String(s.to_lowercase()),
            other => other.clone(),
        };
        result.insert(type_key, value);
    }

    result.insert("ensure".to_string(), Value::String("present".to_string()));
    result.insert("name".to_string(), name);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeSpec;
    use serde_json::json;

    fn path_type() -> ResourceTypeDefinition {
        ResourceTypeDefinition::new("dsc_file", "File", "PSDscResources", "2.12.0.0")
            .with_attribute("dsc_path", AttributeSpec::new("String", "String"))
            .with_attribute(
                "dsc_ensure",
                AttributeSpec::new("Optional[Enum['Present', 'Absent']]", "String"),
            )
            .with_attribute(
                "dsc_credential",
                AttributeSpec::new("Optional[Struct[{}]]", "MSFT_Credential").embedded(),
            )
            .with_attribute("dsc_force", AttributeSpec::new("Optional[Boolean]", "Boolean"))
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key("Path"), "dsc_path");
        assert_eq!(canonical_key("DestinationPath"), "dsc_destinationpath");
        assert_eq!(canonical_key("dsc_path"), "dsc_path");
        assert_eq!(canonical_key("DSC_Path"), "dsc_path");
    }

    #[test]
    fn test_canonical_key_idempotent() {
        for key in ["Path", "dsc_path", "ENSURE", "", "with space", "Ünïcode", "dsc_"] {
            let once = canonical_key(key);
            assert_eq!(canonical_key(&once), once, "not idempotent for {key:?}");
        }
    }

    /// Every combination of prefix, base name and casing
    fn key_shapes() -> Vec<String> {
        let prefixes = ["", "dsc_", "DSC_", "Dsc_", "dsc_dsc_"];
        let bases = [
            "path", "ensure", "name", "force", "credential", "x1", "a-b.c", "with space", "Ünïcode",
            "İstanbul", "",
        ];
        let mut keys = Vec::new();
        for prefix in prefixes {
            for base in bases {
                let key = format!("{prefix}{base}");
                keys.push(key.to_uppercase());
                keys.push(key.to_lowercase());
                keys.push(key);
            }
        }
        keys
    }

    #[test]
    fn test_canonical_key_idempotent_for_all_shapes() {
        for key in key_shapes() {
            let once = canonical_key(&key);
            assert!(once.starts_with(ATTRIBUTE_PREFIX), "{key:?} -> {once:?}");
            assert_eq!(canonical_key(&once), once, "not idempotent for {key:?}");
        }
    }

    #[test]
    fn test_canonicalize_stays_within_schema_for_all_shapes() {
        let definition = path_type();
        let values = [json!("Present"), json!(7), json!(true), json!(null), json!(["A"])];

        for (i, key) in key_shapes().into_iter().enumerate() {
            let mut raw = serde_json::Map::new();
            raw.insert(key.clone(), values[i % values.len()].clone());

            let once = canonicalize(&raw, &definition, json!("x"));
            for (k, v) in &once {
                assert!(
                    definition.declares(k) || is_structural(k),
                    "{key:?} produced undeclared key {k:?}"
                );
                let lowered = definition
                    .attribute(k)
                    .is_some_and(|spec| spec.is_enum() && v.is_string());
                if lowered {
                    assert_eq!(v.as_str(), raw[&key].as_str().map(str::to_lowercase).as_deref());
                }
            }

            let canonical_keys: serde_json::Map<String, Value> = once
                .iter()
                .filter(|(k, _)| !is_structural(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let twice = canonicalize(&canonical_keys, &definition, json!("x"));
            assert_eq!(once, twice, "canonicalize not idempotent for {key:?}");
        }
    }

    #[test]
    fn test_canonical_key_total() {
        assert_eq!(canonical_key(""), "dsc_");
        assert_eq!(canonical_key("a-b.c"), "dsc_a-b.c");
    }

    #[test]
    fn test_to_parameters_excludes_structural_keys() {
        let desired = DesiredState::named("x")
            .with("path", "/etc/foo")
            .with("ensure", "Present");

        let parameters = to_parameters(&path_type(), &desired).unwrap();

        assert_eq!(parameters.len(), 1);
        let path = &parameters["path"];
        assert_eq!(path.value, json!("/etc/foo"));
        assert_eq!(path.mof_type, "String");
        assert!(!path.mof_is_embedded);
    }

    #[test]
    fn test_to_parameters_one_per_key_with_metadata() {
        let desired = DesiredState::named("x")
            .with("dsc_path", "/etc/foo")
            .with("dsc_ensure", "Present")
            .with("dsc_credential", json!({ "user": "admin", "password": "secret" }))
            .with("dsc_force", true);

        let parameters = to_parameters(&path_type(), &desired).unwrap();

        assert_eq!(parameters.len(), 4);
        assert_eq!(parameters["dsc_credential"].mof_type, "MSFT_Credential");
        assert!(parameters["dsc_credential"].mof_is_embedded);
        assert_eq!(parameters["dsc_force"].value, json!(true));
        assert!(!parameters.contains_key("name"));
    }

    #[test]
    fn test_to_parameters_unknown_attribute() {
        let desired = DesiredState::named("x").with("colour", "blue");
        let err = to_parameters(&path_type(), &desired).unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute { ref attribute, .. } if attribute == "colour"));
    }

    #[test]
    fn test_to_parameters_rejects_same_property_twice() {
        for (a, b) in [("path", "dsc_path"), ("Path", "path"), ("DSC_Path", "dsc_path")] {
            let desired = DesiredState::named("x").with(a, "/a").with(b, "/b");
            let err = to_parameters(&path_type(), &desired).unwrap_err();
            assert!(
                matches!(err, Error::DuplicateAttribute { .. }),
                "{a} and {b} should collide, got {err}"
            );
        }
    }

    #[test]
    fn test_canonicalize_scenario() {
        let raw = json!({ "path": "/etc/foo", "ensure": "Present" });
        let result = canonicalize(raw.as_object().unwrap(), &path_type(), json!("x"));

        assert_eq!(
            Value::Object(result),
            json!({
                "dsc_path": "/etc/foo",
                "dsc_ensure": "present",
                "ensure": "present",
                "name": "x",
            })
        );
    }

    #[test]
    fn test_canonicalize_drops_undeclared_keys() {
        let raw = json!({
            "Path": "/etc/foo",
            "ResourceId": "[File]x",
            "ConfigurationName": null,
            "errormessage": "",
        });
        let definition = path_type();
        let result = canonicalize(raw.as_object().unwrap(), &definition, json!("x"));

        for key in result.keys() {
            assert!(
                definition.declares(key) || is_structural(key),
                "unexpected key {key}"
            );
        }
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_canonicalize_enum_lowercase_only_for_text() {
        let definition = ResourceTypeDefinition::new("t", "T", "M", "1.0")
            .with_attribute("dsc_state", AttributeSpec::new("Enum['Running']", "String"))
            .with_attribute("dsc_mode", AttributeSpec::new("Enum['1', '2']", "UInt32"))
            .with_attribute("dsc_label", AttributeSpec::new("String", "String"));

        let raw = json!({ "State": "Running", "Mode": 2, "Label": "MixedCase" });
        let result = canonicalize(raw.as_object().unwrap(), &definition, json!("svc"));

        assert_eq!(result["dsc_state"], json!("running"));
        assert_eq!(result["dsc_mode"], json!(2));
        assert_eq!(result["dsc_label"], json!("MixedCase"));
    }

    #[test]
    fn test_canonicalize_already_canonical_is_noop() {
        let definition = path_type();
        let raw = json!({ "dsc_path": "/etc/foo", "dsc_ensure": "present" });
        let once = canonicalize(raw.as_object().unwrap(), &definition, json!("x"));
        let twice = canonicalize(&once, &definition, json!("x"));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_canonicalize_identity_overrides_output() {
        let definition = path_type().with_attribute("name", AttributeSpec::new("String", ""));
        let raw = json!({ "ensure": "Absent" });
        let result = canonicalize(raw.as_object().unwrap(), &definition, json!("requested"));

        assert_eq!(result["ensure"], json!("present"));
        assert_eq!(result["dsc_ensure"], json!("absent"));
        assert_eq!(result["name"], json!("requested"));
    }
}
