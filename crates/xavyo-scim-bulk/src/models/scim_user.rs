//! SCIM User resource schema (RFC 7643 Sections 4.1 and 4.3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Manager reference of the enterprise user extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimManager {
    /// Identifier of the manager, or a `bulkId:` reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Reference URI.
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub ref_uri: Option<String>,

    /// Manager display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ScimManager {
    /// A manager only counts when it names somebody.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

/// SCIM User resource as carried in bulk `data`.
///
/// Kept as the JSON object the client sent. Only the manager is typed, so
/// nothing else in the payload can make the engine misread it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScimUser {
    attributes: Map<String, Value>,
}

impl ScimUser {
    /// SCIM Core User schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:User";

    /// Enterprise User extension schema URI.
    pub const ENTERPRISE_SCHEMA: &'static str =
        "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

    /// Fully qualified PATCH path of the manager attribute.
    pub const MANAGER_PATH: &'static str =
        "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager";

    /// Wrap a JSON object. Anything else is not a resource.
    #[must_use]
    pub fn from_value(data: Value) -> Option<Self> {
        match data {
            Value::Object(attributes) => Some(Self { attributes }),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.attributes)
    }

    /// Remove the manager from the user, returning it when it names somebody.
    ///
    /// The enterprise extension (and its schema URI) is dropped entirely when
    /// nothing else is left in it. A manager that is not a complex value is
    /// an error; the user is left untouched in that case.
    pub fn take_manager(&mut self) -> Result<Option<ScimManager>, String> {
        let Some(ext_key) = find_key(&self.attributes, Self::ENTERPRISE_SCHEMA) else {
            return Ok(None);
        };
        let Some(Value::Object(ext)) = self.attributes.get_mut(&ext_key) else {
            return Ok(None);
        };
        let Some(manager_key) = find_key(ext, "manager") else {
            return Ok(None);
        };

        let manager = match &ext[&manager_key] {
            Value::Null => None,
            value => Some(
                serde_json::from_value::<ScimManager>(value.clone())
                    .map_err(|e| format!("manager must be a complex value: {e}"))?,
            ),
        };

        ext.remove(&manager_key);
        if ext.is_empty() {
            self.attributes.remove(&ext_key);
            if let Some(Value::Array(schemas)) = self.attributes.get_mut("schemas") {
                schemas.retain(|s| {
                    !s.as_str()
                        .is_some_and(|s| s.eq_ignore_ascii_case(Self::ENTERPRISE_SCHEMA))
                });
            }
        }
        Ok(manager.filter(ScimManager::is_set))
    }
}

/// The key matching `name` case-insensitively, as SCIM attribute names are.
pub(crate) fn find_key(attributes: &Map<String, Value>, name: &str) -> Option<String> {
    attributes
        .keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(data: Value) -> ScimUser {
        ScimUser::from_value(data).unwrap()
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(ScimUser::from_value(json!("jane")).is_none());
        assert!(ScimUser::from_value(json!({})).is_some());
    }

    #[test]
    fn test_take_manager_keeps_other_enterprise_attributes() {
        let mut user = user(json!({
            "schemas": [ScimUser::SCHEMA, ScimUser::ENTERPRISE_SCHEMA],
            "userName": "jane@example.com",
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                "department": "R&D",
                "manager": { "value": "42" }
            }
        }));

        let manager = user.take_manager().unwrap().unwrap();
        assert_eq!(manager.value.as_deref(), Some("42"));

        let json = user.into_value();
        let ext = &json["urn:ietf:params:scim:schemas:extension:enterprise:2.0:User"];
        assert_eq!(ext["department"], "R&D");
        assert!(ext.get("manager").is_none());
        assert_eq!(json["schemas"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_take_manager_drops_empty_extension() {
        let mut user = user(json!({
            "schemas": [ScimUser::SCHEMA, ScimUser::ENTERPRISE_SCHEMA],
            "userName": "jane@example.com",
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                "manager": { "value": "42" }
            }
        }));

        assert!(user.take_manager().unwrap().is_some());
        assert_eq!(
            user.into_value(),
            json!({ "schemas": [ScimUser::SCHEMA], "userName": "jane@example.com" })
        );
    }

    #[test]
    fn test_take_manager_ignores_unrelated_attribute_types() {
        let mut user = user(json!({
            "userName": "jane@example.com",
            "active": "true",
            "meta": { "created": "yesterday" },
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                "manager": { "value": "bulkId:boss" }
            }
        }));

        let manager = user.take_manager().unwrap().unwrap();
        assert_eq!(manager.value.as_deref(), Some("bulkId:boss"));

        let json = user.into_value();
        assert_eq!(json["active"], "true");
        assert_eq!(json["meta"]["created"], "yesterday");
        assert!(json.get("schemas").is_none());
    }

    #[test]
    fn test_take_manager_is_case_insensitive() {
        let mut user = user(json!({
            "URN:IETF:PARAMS:SCIM:SCHEMAS:EXTENSION:ENTERPRISE:2.0:USER": {
                "Manager": { "value": "42" }
            }
        }));

        assert!(user.take_manager().unwrap().is_some());
        assert_eq!(user.into_value(), json!({}));
    }

    #[test]
    fn test_string_manager_is_rejected() {
        let data = json!({
            "userName": "jane@example.com",
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                "manager": "bulkId:boss"
            }
        });
        let mut user = user(data.clone());

        assert!(user.take_manager().is_err());
        assert_eq!(user.into_value(), data);
    }

    #[test]
    fn test_blank_or_null_manager_is_stripped_but_not_set() {
        for manager in [json!({ "value": "  " }), Value::Null] {
            let mut user = user(json!({
                "userName": "jane@example.com",
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                    "manager": manager
                }
            }));

            assert!(user.take_manager().unwrap().is_none());
            assert!(user
                .into_value()
                .get(ScimUser::ENTERPRISE_SCHEMA)
                .is_none());
        }
    }
}
