//! In-memory resource provider with call recording and failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use xavyo_scim_bulk::models::{PatchOpKind, ScimPatchRequest, ScimUser};
use xavyo_scim_bulk::{ResourceIdentifier, ResourceKind, ResourceProvider, ScimError, ScimResult};

/// A provider call, as recorded by [`MemoryProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { kind: String, resource: Value },
    Update { kind: String, id: String, patch: ScimPatchRequest },
    Delete { kind: String, id: String },
}

/// Stores resources in a map keyed by (path segment, id). Identifiers are
/// handed out sequentially starting at 1.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    resources: Mutex<HashMap<(String, String), Value>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    rejected_user_names: Mutex<HashSet<String>>,
    rejected_targets: Mutex<HashSet<String>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an existing resource.
    pub fn seed(&self, kind: &str, id: &str, resource: Value) {
        let mut resource = resource;
        resource["id"] = json!(id);
        self.resources
            .lock()
            .unwrap()
            .insert((kind.to_string(), id.to_string()), resource);
    }

    /// Fail creations whose `userName` or `displayName` is `name` with 409.
    pub fn reject_name(&self, name: &str) {
        self.rejected_user_names
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    /// Fail updates of resource `id` with 400.
    pub fn reject_updates_of(&self, id: &str) {
        self.rejected_targets.lock().unwrap().insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creations(&self) -> usize {
        self.count(|c| matches!(c, Call::Create { .. }))
    }

    pub fn updates(&self) -> usize {
        self.count(|c| matches!(c, Call::Update { .. }))
    }

    pub fn deletions(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete { .. }))
    }

    pub fn resource(&self, kind: &str, id: &str) -> Option<Value> {
        self.resources
            .lock()
            .unwrap()
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn apply_patch(resource: &mut Value, patch: &ScimPatchRequest) {
    for op in &patch.operations {
        let Some(path) = op.path.as_deref() else {
            if let (Some(Value::Object(values)), Some(target)) = (&op.value, resource.as_object_mut()) {
                for (key, value) in values {
                    target.insert(key.clone(), value.clone());
                }
            }
            continue;
        };

        if path == ScimUser::MANAGER_PATH {
            resource[ScimUser::ENTERPRISE_SCHEMA]["manager"] = op.value.clone().unwrap_or(Value::Null);
            continue;
        }

        match op.op {
            PatchOpKind::Remove => {
                if let Some(target) = resource.as_object_mut() {
                    target.remove(path);
                }
            }
            PatchOpKind::Add => match (&mut resource[path], op.value.clone()) {
                (Value::Array(existing), Some(Value::Array(added))) => existing.extend(added),
                (slot, Some(value)) => *slot = value,
                (_, None) => {}
            },
            PatchOpKind::Replace => {
                resource[path] = op.value.clone().unwrap_or(Value::Null);
            }
        }
    }
}

#[async_trait]
impl ResourceProvider for MemoryProvider {
    async fn create(&self, kind: &ResourceKind, resource: Value) -> ScimResult<Value> {
        self.record(Call::Create {
            kind: kind.path_segment().to_string(),
            resource: resource.clone(),
        });

        let name = resource
            .get("userName")
            .or_else(|| resource.get("displayName"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if self.rejected_user_names.lock().unwrap().contains(&name) {
            return Err(ScimError::Conflict {
                resource_type: kind.resource_type().to_string(),
                field: "userName".to_string(),
                value: name,
            });
        }

        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let mut stored = resource;
        stored["id"] = json!(id);
        stored["meta"] = json!({
            "resourceType": kind.resource_type(),
            "version": format!("W/\"{id}\"")
        });
        self.resources
            .lock()
            .unwrap()
            .insert((kind.path_segment().to_string(), id), stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        identifier: &ResourceIdentifier,
        patch: &ScimPatchRequest,
    ) -> ScimResult<Option<Value>> {
        let kind = identifier.kind.path_segment().to_string();
        self.record(Call::Update {
            kind: kind.clone(),
            id: identifier.identifier.clone(),
            patch: patch.clone(),
        });

        if self
            .rejected_targets
            .lock()
            .unwrap()
            .contains(&identifier.identifier)
        {
            return Err(ScimError::Validation(format!(
                "Resource {} rejects updates",
                identifier.identifier
            )));
        }

        let mut resources = self.resources.lock().unwrap();
        let resource = resources
            .get_mut(&(kind, identifier.identifier.clone()))
            .ok_or_else(|| ScimError::NotFound(identifier.identifier.clone()))?;
        apply_patch(resource, patch);
        Ok(Some(resource.clone()))
    }

    async fn delete(&self, identifier: &ResourceIdentifier) -> ScimResult<()> {
        let kind = identifier.kind.path_segment().to_string();
        self.record(Call::Delete {
            kind: kind.clone(),
            id: identifier.identifier.clone(),
        });

        self.resources
            .lock()
            .unwrap()
            .remove(&(kind, identifier.identifier.clone()))
            .map(|_| ())
            .ok_or_else(|| ScimError::NotFound(identifier.identifier.clone()))
    }
}
