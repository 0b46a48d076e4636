//! Test fixtures for bulk request payloads.

use serde_json::{json, Value};
use uuid::Uuid;
use xavyo_scim_bulk::models::{BulkRequest, BulkRequestOperation};

pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const ENTERPRISE_SCHEMA: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";
pub const PATCH_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// Generate a unique test email.
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4())
}

/// A SCIM user payload.
pub fn user_payload(user_name: &str) -> Value {
    json!({
        "schemas": [USER_SCHEMA],
        "userName": user_name,
        "name": {
            "givenName": "Test",
            "familyName": "User"
        },
        "active": true
    })
}

/// A SCIM user payload with an enterprise manager.
pub fn user_with_manager(user_name: &str, manager: &str) -> Value {
    let mut payload = user_payload(user_name);
    payload[ENTERPRISE_SCHEMA] = json!({
        "employeeNumber": "701984",
        "manager": { "value": manager }
    });
    payload["schemas"]
        .as_array_mut()
        .unwrap()
        .push(json!(ENTERPRISE_SCHEMA));
    payload
}

/// A SCIM group payload with the given member values.
pub fn group_payload(display_name: &str, members: &[&str]) -> Value {
    let members: Vec<Value> = members
        .iter()
        .map(|value| json!({ "value": value, "type": "User" }))
        .collect();
    json!({
        "schemas": [GROUP_SCHEMA],
        "displayName": display_name,
        "members": members
    })
}

/// A PatchOp adding `members` with the given values.
pub fn add_members_patch(values: &[&str]) -> Value {
    let members: Vec<Value> = values.iter().map(|value| json!({ "value": value })).collect();
    json!({
        "schemas": [PATCH_SCHEMA],
        "Operations": [{ "op": "add", "path": "members", "value": members }]
    })
}

/// A PatchOp replacing one attribute.
pub fn replace_patch(path: &str, value: Value) -> Value {
    json!({
        "schemas": [PATCH_SCHEMA],
        "Operations": [{ "op": "replace", "path": path, "value": value }]
    })
}

pub fn post(bulk_id: &str, path: &str, data: Value) -> BulkRequestOperation {
    BulkRequestOperation {
        method: "POST".to_string(),
        bulk_id: Some(bulk_id.to_string()),
        version: None,
        path: path.to_string(),
        data: Some(data),
    }
}

pub fn patch(path: &str, data: Value) -> BulkRequestOperation {
    BulkRequestOperation {
        method: "PATCH".to_string(),
        bulk_id: None,
        version: None,
        path: path.to_string(),
        data: Some(data),
    }
}

pub fn delete(path: &str) -> BulkRequestOperation {
    BulkRequestOperation {
        method: "DELETE".to_string(),
        bulk_id: None,
        version: None,
        path: path.to_string(),
        data: None,
    }
}

pub fn bulk_request(operations: Vec<BulkRequestOperation>) -> BulkRequest {
    BulkRequest::new(operations)
}
