//! SCIM Bulk request and response messages (RFC 7644 Section 3.7).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods accepted inside a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkMethod {
    /// Create a resource.
    Post,
    /// Modify a resource.
    Patch,
    /// Delete a resource.
    Delete,
}

impl BulkMethod {
    /// Parse a method name, ignoring case. PUT and anything else is rejected.
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        if method.eq_ignore_ascii_case("POST") {
            Some(Self::Post)
        } else if method.eq_ignore_ascii_case("PATCH") {
            Some(Self::Patch)
        } else if method.eq_ignore_ascii_case("DELETE") {
            Some(Self::Delete)
        } else {
            None
        }
    }

    /// Canonical method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for BulkMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation of a bulk request, as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequestOperation {
    /// HTTP method of the operation.
    pub method: String,

    /// Client-chosen temporary identifier. Required for POST.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_id: Option<String>,

    /// Resource version for conditional operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Resource path relative to the service base (e.g. "/Users/2819c223").
    #[serde(default)]
    pub path: String,

    /// Operation payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl BulkRequestOperation {
    /// Short human-readable label used in logs and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.bulk_id {
            Some(bulk_id) => format!("{} {} (bulkId: {bulk_id})", self.method, self.path),
            None => format!("{} {}", self.method, self.path),
        }
    }
}

/// SCIM Bulk request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    /// SCIM schemas.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Number of errors after which the server stops processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_on_errors: Option<u32>,

    /// Operations in submission order.
    #[serde(rename = "Operations", default)]
    pub operations: Vec<BulkRequestOperation>,
}

impl BulkRequest {
    /// SCIM Bulk request schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:BulkRequest";

    /// Create a bulk request from operations.
    #[must_use]
    pub fn new(operations: Vec<BulkRequestOperation>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            fail_on_errors: None,
            operations,
        }
    }

    /// Set `failOnErrors`.
    #[must_use]
    pub fn with_fail_on_errors(mut self, threshold: u32) -> Self {
        self.fail_on_errors = Some(threshold);
        self
    }

    /// Whether the request declares the BulkRequest schema.
    #[must_use]
    pub fn has_schema(&self) -> bool {
        self.schemas.iter().any(|s| s == Self::SCHEMA)
    }
}

/// Outcome of one operation in a bulk response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponseOperation {
    /// HTTP method of the original operation.
    pub method: String,

    /// bulkId of the original operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_id: Option<String>,

    /// Version of the resource after the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Location of the affected resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// HTTP status code as string.
    pub status: String,

    /// Error body or resource representation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

/// SCIM Bulk response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    /// SCIM schemas.
    pub schemas: Vec<String>,

    /// Operation outcomes in submission order.
    #[serde(rename = "Operations")]
    pub operations: Vec<BulkResponseOperation>,
}

impl BulkResponse {
    /// SCIM Bulk response schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:BulkResponse";

    /// Create a bulk response from operation outcomes.
    #[must_use]
    pub fn new(operations: Vec<BulkResponseOperation>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            operations,
        }
    }

    /// Find the outcome of the operation with `bulk_id`.
    #[must_use]
    pub fn operation(&self, bulk_id: &str) -> Option<&BulkResponseOperation> {
        self.operations
            .iter()
            .find(|op| op.bulk_id.as_deref() == Some(bulk_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse() {
        assert_eq!(BulkMethod::parse("post"), Some(BulkMethod::Post));
        assert_eq!(BulkMethod::parse("PATCH"), Some(BulkMethod::Patch));
        assert_eq!(BulkMethod::parse("Delete"), Some(BulkMethod::Delete));
        assert_eq!(BulkMethod::parse("PUT"), None);
        assert_eq!(BulkMethod::parse("GET"), None);
    }

    #[test]
    fn test_deserialize_bulk_request() {
        let request: BulkRequest = serde_json::from_value(json!({
            "schemas": [BulkRequest::SCHEMA],
            "failOnErrors": 1,
            "Operations": [
                {
                    "method": "POST",
                    "path": "/Users",
                    "bulkId": "qwerty",
                    "data": { "userName": "Alice" }
                },
                { "method": "DELETE", "path": "/Users/b7c14771", "version": "W/\"0ee8add0\"" }
            ]
        }))
        .unwrap();

        assert!(request.has_schema());
        assert_eq!(request.fail_on_errors, Some(1));
        assert_eq!(request.operations.len(), 2);
        assert_eq!(request.operations[0].bulk_id.as_deref(), Some("qwerty"));
        assert!(request.operations[1].data.is_none());
        assert_eq!(
            request.operations[0].describe(),
            "POST /Users (bulkId: qwerty)"
        );
    }

    #[test]
    fn test_serialize_bulk_response() {
        let response = BulkResponse::new(vec![BulkResponseOperation {
            method: "POST".to_string(),
            bulk_id: Some("qwerty".to_string()),
            version: None,
            location: Some("https://example.com/v2/Users/92b725cd".to_string()),
            status: "201".to_string(),
            response: None,
        }]);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["schemas"][0], BulkResponse::SCHEMA);
        assert_eq!(json["Operations"][0]["bulkId"], "qwerty");
        assert_eq!(json["Operations"][0]["status"], "201");
        assert!(json["Operations"][0].get("response").is_none());
        assert!(response.operation("qwerty").is_some());
    }
}
