//! Per-operation outcomes and BulkResponse assembly.

use http::StatusCode;
use serde_json::Value;

use crate::bulk::graph::BulkGraph;
use crate::error::{ScimError, ScimErrorResponse, ScimErrorType};
use crate::models::{BulkResponse, BulkResponseOperation};

/// Body of an operation response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Resource(Value),
    Error(ScimErrorResponse),
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub version: Option<String>,
    pub body: ResponseBody,
}

impl OperationResponse {
    /// 201 with the created resource.
    #[must_use]
    pub fn created(resource: Value, location: Option<String>) -> Self {
        Self::with_resource(StatusCode::CREATED, resource, location)
    }

    /// 200 with the updated resource.
    #[must_use]
    pub fn ok(resource: Value, location: Option<String>) -> Self {
        Self::with_resource(StatusCode::OK, resource, location)
    }

    /// 204.
    #[must_use]
    pub fn no_content(location: Option<String>) -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            location,
            version: None,
            body: ResponseBody::Empty,
        }
    }

    /// An error response.
    pub fn error(
        status: StatusCode,
        detail: impl Into<String>,
        scim_type: Option<ScimErrorType>,
    ) -> Self {
        Self::from_error_body(ScimErrorResponse::new(status, detail, scim_type), None)
    }

    /// The error response for a provider failure.
    #[must_use]
    pub fn from_scim_error(error: &ScimError) -> Self {
        Self::from_error_body(error.to_response(), None)
    }

    /// Wrap an RFC 7644 error body; the status is read from the body.
    #[must_use]
    pub fn from_error_body(body: ScimErrorResponse, location: Option<String>) -> Self {
        let status = body
            .status
            .parse::<u16>()
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            location,
            version: None,
            body: ResponseBody::Error(body),
        }
    }

    /// Replace the location.
    #[must_use]
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Whether this response reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.body, ResponseBody::Error(_))
    }

    /// Error body, when this is an error.
    #[must_use]
    pub fn error_body(&self) -> Option<&ScimErrorResponse> {
        match &self.body {
            ResponseBody::Error(error) => Some(error),
            _ => None,
        }
    }

    fn with_resource(status: StatusCode, resource: Value, location: Option<String>) -> Self {
        let version = resource
            .pointer("/meta/version")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            status,
            location,
            version,
            body: ResponseBody::Resource(resource),
        }
    }
}

/// Assemble the BulkResponse for `graph`.
///
/// Client operations appear in submission order; generated subordinates are
/// folded into their parent. Operations that never ran (processing stopped on
/// `failOnErrors`) are left out. A creation still waiting for subordinates is
/// reported with its creation response, since the resource exists.
#[must_use]
pub fn aggregate(graph: &BulkGraph) -> BulkResponse {
    let operations = graph
        .iter()
        .filter(|ctx| !ctx.is_subordinate())
        .filter_map(|ctx| {
            let response = ctx.state().response()?;
            let body = match &response.body {
                ResponseBody::Empty => None,
                ResponseBody::Resource(resource) => Some(resource.clone()),
                ResponseBody::Error(error) => serde_json::to_value(error).ok(),
            };
            Some(BulkResponseOperation {
                method: ctx.method().as_str().to_string(),
                bulk_id: ctx.bulk_id().map(str::to_string),
                version: response.version.clone(),
                location: response.location.clone(),
                status: response.status.as_u16().to_string(),
                response: body,
            })
        })
        .collect();

    BulkResponse::new(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_created_reads_version() {
        let response = OperationResponse::created(
            json!({ "id": "42", "meta": { "version": "W/\"1\"" } }),
            Some("https://example.com/v2/Users/42".to_string()),
        );

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.version.as_deref(), Some("W/\"1\""));
        assert!(!response.is_error());
    }

    #[test]
    fn test_error_response() {
        let response = OperationResponse::error(
            StatusCode::NOT_FOUND,
            "Referenced resource bulkId:qwerty was not created",
            Some(ScimErrorType::NoTarget),
        );

        assert!(response.is_error());
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(
            response.error_body().unwrap().scim_type.as_deref(),
            Some("noTarget")
        );
    }

    #[test]
    fn test_from_scim_error_keeps_status() {
        let response = OperationResponse::from_scim_error(&ScimError::Conflict {
            resource_type: "User".to_string(),
            field: "userName".to_string(),
            value: "alice".to_string(),
        })
        .with_location(Some("https://example.com/v2/Users/1".to_string()));

        assert_eq!(response.status, StatusCode::CONFLICT);
        assert_eq!(
            response.error_body().unwrap().scim_type.as_deref(),
            Some("uniqueness")
        );
        assert!(response.location.is_some());
    }
}
