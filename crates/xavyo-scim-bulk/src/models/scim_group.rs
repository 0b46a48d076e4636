//! SCIM Group resource schema (RFC 7643 Section 4.2).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::scim_user::find_key;

/// SCIM Group member reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupMember {
    /// Member ID (user or nested group), or a `bulkId:` reference.
    pub value: String,

    /// Member display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Member type (typically "User").
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,

    /// Reference URI.
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub ref_uri: Option<String>,
}

/// SCIM Group resource as carried in bulk `data`, kept as the JSON object
/// the client sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScimGroup {
    attributes: Map<String, Value>,
}

impl ScimGroup {
    /// SCIM Core Group schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:Group";

    /// PATCH path of the members attribute.
    pub const MEMBERS_PATH: &'static str = "members";

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

    /// Remove and return every member.
    ///
    /// `members` must be an array of member objects (or null); otherwise the
    /// group is left untouched and the reason is returned.
    pub fn take_members(&mut self) -> Result<Vec<ScimGroupMember>, String> {
        let Some(key) = find_key(&self.attributes, Self::MEMBERS_PATH) else {
            return Ok(Vec::new());
        };

        let members = match &self.attributes[&key] {
            Value::Null => Vec::new(),
            Value::Array(members) => members
                .iter()
                .map(|member| {
                    serde_json::from_value::<ScimGroupMember>(member.clone())
                        .map_err(|e| format!("invalid group member: {e}"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err("members must be an array".to_string()),
        };

        self.attributes.remove(&key);
        Ok(members)
    }
}
