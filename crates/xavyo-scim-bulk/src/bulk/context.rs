//! One scheduled operation and its links into the graph.

use serde_json::Value;

use crate::bulk::response::OperationResponse;
use crate::bulk::state::{OperationState, OperationStatus};
use crate::models::{BulkMethod, BulkRequestOperation, ScimPatchRequest};
use crate::services::ResourceKind;

/// Index of an [`OperationContext`] in its [`BulkGraph`](crate::bulk::BulkGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) usize);

impl ContextId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an operation does, decoded from its raw `data`.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationPayload {
    /// POST: the resource with relational attributes stripped.
    Creation { kind: ResourceKind, resource: Value },
    /// PATCH, client-sent or generated for a relational attribute.
    Update { patch: ScimPatchRequest },
    /// DELETE: the path is all there is.
    Deletion,
}

/// A bulk operation in flight.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub(crate) id: ContextId,
    pub(crate) operation: BulkRequestOperation,
    pub(crate) method: BulkMethod,
    pub(crate) payload: OperationPayload,
    pub(crate) state: OperationState,
    pub(crate) dependencies: Vec<ContextId>,
    pub(crate) dependents: Vec<ContextId>,
    pub(crate) parent: Option<ContextId>,
    pub(crate) subordinates: Vec<ContextId>,
    pub(crate) label: String,
}

impl OperationContext {
    pub(crate) fn new(
        id: ContextId,
        operation: BulkRequestOperation,
        method: BulkMethod,
        payload: OperationPayload,
        parent: Option<ContextId>,
        label: String,
    ) -> Self {
        Self {
            id,
            operation,
            method,
            payload,
            state: OperationState::Received,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            parent,
            subordinates: Vec::new(),
            label,
        }
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The operation as submitted (synthesized for subordinates).
    #[must_use]
    pub fn operation(&self) -> &BulkRequestOperation {
        &self.operation
    }

    #[must_use]
    pub fn method(&self) -> BulkMethod {
        self.method
    }

    #[must_use]
    pub fn bulk_id(&self) -> Option<&str> {
        self.operation.bulk_id.as_deref()
    }

    #[must_use]
    pub fn payload(&self) -> &OperationPayload {
        &self.payload
    }

    #[must_use]
    pub fn state(&self) -> &OperationState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.state.status()
    }

    /// Processed or Faulted.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status().is_terminal()
    }

    #[must_use]
    pub fn is_creation(&self) -> bool {
        matches!(self.payload, OperationPayload::Creation { .. })
    }

    /// Whether this operation was generated from a relational attribute of
    /// its parent.
    #[must_use]
    pub fn is_subordinate(&self) -> bool {
        self.parent.is_some()
    }

    #[must_use]
    pub fn response(&self) -> Option<&OperationResponse> {
        self.state.response()
    }

    /// Location recorded for the operation, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.response().and_then(|r| r.location.as_deref())
    }

    /// Creations this operation references.
    #[must_use]
    pub fn dependencies(&self) -> &[ContextId] {
        &self.dependencies
    }

    /// Operations referencing this creation.
    #[must_use]
    pub fn dependents(&self) -> &[ContextId] {
        &self.dependents
    }

    #[must_use]
    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    #[must_use]
    pub fn subordinates(&self) -> &[ContextId] {
        &self.subordinates
    }

    /// Human-readable label for logs and error details.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}
