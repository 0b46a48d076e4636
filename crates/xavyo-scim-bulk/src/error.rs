//! SCIM error types for bulk processing (RFC 7644 Section 3.12).
//!
//! Two families live here:
//!
//! - [`ScimError`] is a per-operation failure. The engine turns it into a
//!   faulted operation and keeps going with the rest of the bulk request.
//! - [`BulkError`] is a failure of the bulk request as a whole: either the
//!   request is structurally invalid (rejected before anything runs) or a
//!   state-machine contract was violated.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bulk::OperationStatus;

/// SCIM error types as defined in RFC 7644 Section 3.12
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScimErrorType {
    /// Filter syntax is invalid
    InvalidFilter,
    /// Too many operations or payload too large
    TooMany,
    /// Uniqueness constraint violated (e.g., duplicate userName)
    Uniqueness,
    /// Attempted to modify immutable attribute
    Mutability,
    /// Request syntax is invalid
    InvalidSyntax,
    /// Attribute path is invalid
    InvalidPath,
    /// Target resource not found for operation
    NoTarget,
    /// Attribute value is invalid
    InvalidValue,
    /// SCIM protocol version mismatch
    InvalidVers,
    /// Operation not permitted due to sensitivity
    Sensitive,
}

impl ScimErrorType {
    /// Wire name of the error type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFilter => "invalidFilter",
            Self::TooMany => "tooMany",
            Self::Uniqueness => "uniqueness",
            Self::Mutability => "mutability",
            Self::InvalidSyntax => "invalidSyntax",
            Self::InvalidPath => "invalidPath",
            Self::NoTarget => "noTarget",
            Self::InvalidValue => "invalidValue",
            Self::InvalidVers => "invalidVers",
            Self::Sensitive => "sensitive",
        }
    }
}

impl std::fmt::Display for ScimErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SCIM error response body as defined in RFC 7644
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    /// Always ["urn:ietf:params:scim:api:messages:2.0:Error"]
    pub schemas: Vec<String>,
    /// Optional SCIM error type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,
    /// Human-readable error message
    pub detail: String,
    /// HTTP status code as string
    pub status: String,
}

impl ScimErrorResponse {
    /// SCIM Error message schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:Error";

    /// Create a new SCIM error response
    pub fn new(
        status: StatusCode,
        detail: impl Into<String>,
        scim_type: Option<ScimErrorType>,
    ) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            scim_type: scim_type.map(|t| t.to_string()),
            detail: detail.into(),
            status: status.as_u16().to_string(),
        }
    }
}

/// Failure of a single operation.
///
/// Resource providers return this from every call, and the engine uses it
/// for resolution failures. It never aborts the bulk request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScimError {
    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Target of an operation could not be resolved
    #[error("No target: {0}")]
    NoTarget(String),

    /// Uniqueness constraint violated
    #[error("A {resource_type} with {field} '{value}' already exists")]
    Conflict {
        resource_type: String,
        field: String,
        value: String,
    },

    /// Invalid SCIM filter syntax
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid request syntax
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Path does not address a resource
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Attempt to modify an immutable attribute
    #[error("Mutability violation: {0}")]
    Mutability(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ScimError {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScimError::NotFound(_) | ScimError::NoTarget(_) => StatusCode::NOT_FOUND,
            ScimError::Conflict { .. } => StatusCode::CONFLICT,
            ScimError::InvalidFilter(_)
            | ScimError::BadRequest(_)
            | ScimError::InvalidPath(_)
            | ScimError::Mutability(_)
            | ScimError::Validation(_) => StatusCode::BAD_REQUEST,
            ScimError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the SCIM error type for this error
    #[must_use]
    pub fn scim_type(&self) -> Option<ScimErrorType> {
        match self {
            ScimError::NoTarget(_) => Some(ScimErrorType::NoTarget),
            ScimError::Conflict { .. } => Some(ScimErrorType::Uniqueness),
            ScimError::InvalidFilter(_) => Some(ScimErrorType::InvalidFilter),
            ScimError::BadRequest(_) => Some(ScimErrorType::InvalidSyntax),
            ScimError::InvalidPath(_) => Some(ScimErrorType::InvalidPath),
            ScimError::Mutability(_) => Some(ScimErrorType::Mutability),
            ScimError::Validation(_) => Some(ScimErrorType::InvalidValue),
            ScimError::NotFound(_) | ScimError::Internal(_) => None,
        }
    }

    /// Convert to SCIM error response
    #[must_use]
    pub fn to_response(&self) -> ScimErrorResponse {
        ScimErrorResponse::new(self.status_code(), self.to_string(), self.scim_type())
    }
}

/// Result type alias for per-operation SCIM calls
pub type ScimResult<T> = Result<T, ScimError>;

/// Failure of a bulk request as a whole.
#[derive(Debug, Error)]
pub enum BulkError {
    /// The bulk request document is malformed
    #[error("Invalid bulk request: {0}")]
    InvalidRequest(String),

    /// The bulk request body could not be decoded
    #[error("Invalid bulk request body: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation uses a method the bulk endpoint does not accept
    #[error("Operation {index}: unsupported bulk method '{method}'")]
    UnsupportedMethod { index: usize, method: String },

    /// An operation is missing required members or carries malformed data
    #[error("Operation {index}: {reason}")]
    InvalidOperation { index: usize, reason: String },

    /// Two operations share a bulkId
    #[error("Duplicate bulkId '{0}'")]
    DuplicateBulkId(String),

    /// No base resource identifier to resolve relative paths against
    #[error("Bulk request has no base resource identifier")]
    MissingBaseIdentifier,

    /// More operations than the server accepts
    #[error("Bulk request contains {count} operations, the maximum is {max}")]
    TooManyOperations { count: usize, max: usize },

    /// Payload larger than the server accepts
    #[error("Bulk request payload is {size} bytes, the maximum is {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// An operation was moved out of its allowed lifecycle
    #[error("Invalid state transition for {operation}: {from} -> {to}")]
    InvalidStateTransition {
        operation: String,
        from: OperationStatus,
        to: OperationStatus,
    },

    /// A dependency edge was added after scheduling started
    #[error("Cannot link a dependency to {operation}: the operation graph is sealed")]
    GraphSealed { operation: String },

    /// A context index that does not belong to the graph
    #[error("Unknown operation context #{0}")]
    UnknownContext(usize),
}

impl BulkError {
    /// Whether the error was caused by the client's request (as opposed to a
    /// broken engine invariant).
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            BulkError::InvalidStateTransition { .. }
                | BulkError::GraphSealed { .. }
                | BulkError::UnknownContext(_)
        )
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            BulkError::TooManyOperations { .. } | BulkError::PayloadTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            BulkError::InvalidStateTransition { .. }
            | BulkError::GraphSealed { .. }
            | BulkError::UnknownContext(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the SCIM error type for this error
    #[must_use]
    pub fn scim_type(&self) -> Option<ScimErrorType> {
        match self {
            BulkError::TooManyOperations { .. } | BulkError::PayloadTooLarge { .. } => {
                Some(ScimErrorType::TooMany)
            }
            BulkError::DuplicateBulkId(_) | BulkError::InvalidOperation { .. } => {
                Some(ScimErrorType::InvalidValue)
            }
            BulkError::InvalidRequest(_)
            | BulkError::Json(_)
            | BulkError::UnsupportedMethod { .. }
            | BulkError::MissingBaseIdentifier => Some(ScimErrorType::InvalidSyntax),
            BulkError::InvalidStateTransition { .. }
            | BulkError::GraphSealed { .. }
            | BulkError::UnknownContext(_) => None,
        }
    }

    /// Convert to SCIM error response
    #[must_use]
    pub fn to_response(&self) -> ScimErrorResponse {
        ScimErrorResponse::new(self.status_code(), self.to_string(), self.scim_type())
    }
}

/// Result type alias for bulk-level calls
pub type BulkResult<T> = Result<T, BulkError>;
