//! SCIM PATCH request (RFC 7644 Section 3.5.2) and `bulkId` reference lookup.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of a reference to another operation of the same bulk request
/// (RFC 7644 Section 3.7.2).
pub const BULK_ID_PREFIX: &str = "bulkId:";

/// The placeholder value a client writes to reference `bulk_id`.
#[must_use]
pub fn bulk_id_reference(bulk_id: &str) -> String {
    format!("{BULK_ID_PREFIX}{bulk_id}")
}

/// PATCH operation type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    /// Add a value.
    #[serde(alias = "Add", alias = "ADD")]
    Add,
    /// Remove a value.
    #[serde(alias = "Remove", alias = "REMOVE")]
    Remove,
    /// Replace a value.
    #[serde(alias = "Replace", alias = "REPLACE")]
    Replace,
}

/// SCIM PATCH operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimPatchOp {
    /// Operation type.
    pub op: PatchOpKind,

    /// Attribute path (e.g., "displayName", "members[value eq \"123\"]").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Value to set (for add/replace operations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ScimPatchOp {
    /// `add` operation.
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: Some(path.into()),
            value: Some(value),
        }
    }
}

/// Location of a value inside a PATCH request: the operation index and a
/// JSON pointer (RFC 6901) into that operation's `value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueSlot {
    /// Index into [`ScimPatchRequest::operations`].
    pub operation: usize,
    /// JSON pointer relative to the operation's value; empty for the value
    /// itself.
    pub pointer: String,
}

/// SCIM PATCH request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimPatchRequest {
    /// SCIM schemas.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Operations to perform.
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOp>,
}

impl ScimPatchRequest {
    /// SCIM Patch Operation schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

    /// Create a patch request from operations.
    #[must_use]
    pub fn new(operations: Vec<ScimPatchOp>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            operations,
        }
    }

    /// Validate the patch request.
    pub fn validate(&self) -> Result<(), String> {
        if !self.schemas.iter().any(|s| s == Self::SCHEMA) {
            return Err("Missing PatchOp schema".to_string());
        }
        if self.operations.is_empty() {
            return Err("PatchOp contains no operations".to_string());
        }

        for (i, op) in self.operations.iter().enumerate() {
            match op.op {
                PatchOpKind::Remove if op.path.is_none() => {
                    return Err(format!("Remove operation at index {i} requires a path"));
                }
                PatchOpKind::Add | PatchOpKind::Replace if op.value.is_none() => {
                    return Err(format!("Operation at index {i} requires a value"));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Whether any operation value references `bulk_id`.
    #[must_use]
    pub fn references(&self, bulk_id: &str) -> bool {
        self.find_reference(bulk_id).next().is_some()
    }

    /// Every value slot holding a reference to `bulk_id`, or `None` when there
    /// is none.
    #[must_use]
    pub fn try_find_reference(&self, bulk_id: &str) -> Option<Vec<ValueSlot>> {
        let slots: Vec<ValueSlot> = self.find_reference(bulk_id).collect();
        if slots.is_empty() {
            None
        } else {
            Some(slots)
        }
    }

    /// Overwrite the value at `slot` with `replacement`. Returns false when the
    /// slot does not exist.
    pub fn replace_slot(&mut self, slot: &ValueSlot, replacement: &str) -> bool {
        let target = self
            .operations
            .get_mut(slot.operation)
            .and_then(|op| op.value.as_mut())
            .and_then(|value| value.pointer_mut(&slot.pointer));

        match target {
            Some(value) => {
                *value = Value::String(replacement.to_string());
                true
            }
            None => false,
        }
    }

    fn find_reference<'a>(&'a self, bulk_id: &str) -> impl Iterator<Item = ValueSlot> + 'a {
        let token = bulk_id_reference(bulk_id);
        self.operations
            .iter()
            .enumerate()
            .flat_map(move |(index, op)| {
                let mut pointers = Vec::new();
                if let Some(value) = &op.value {
                    collect_pointers(value, &token, &mut String::new(), &mut pointers);
                }
                pointers.into_iter().map(move |pointer| ValueSlot {
                    operation: index,
                    pointer,
                })
            })
    }
}

fn collect_pointers(value: &Value, token: &str, pointer: &mut String, out: &mut Vec<String>) {
    match value {
        Value::String(s) if s == token => out.push(pointer.clone()),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&index.to_string());
                collect_pointers(item, token, pointer, out);
                pointer.truncate(len);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
                collect_pointers(item, token, pointer, out);
                pointer.truncate(len);
            }
        }
        _ => {}
    }
}
