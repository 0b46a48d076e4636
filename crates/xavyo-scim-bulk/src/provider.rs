//! Resource provider seam.
//!
//! The bulk engine never touches storage itself. Every prepared operation is
//! handed to a [`ResourceProvider`] as a [`ProviderRequest`].

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ScimResult;
use crate::models::ScimPatchRequest;
use crate::services::{ResourceIdentifier, ResourceKind};

/// Storage backend for SCIM resources.
///
/// Implementations return the stored representation of created and updated
/// resources. When that representation carries `meta.location` it is used as
/// the operation location, otherwise the engine derives one from `id`.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Create a resource of `kind`.
    async fn create(&self, kind: &ResourceKind, resource: Value) -> ScimResult<Value>;

    /// Apply `patch` to the identified resource. `None` means the update
    /// succeeded without a representation to return (204).
    async fn update(
        &self,
        identifier: &ResourceIdentifier,
        patch: &ScimPatchRequest,
    ) -> ScimResult<Option<Value>>;

    /// Delete the identified resource.
    async fn delete(&self, identifier: &ResourceIdentifier) -> ScimResult<()>;
}

/// A fully resolved call to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRequest {
    /// Create a resource.
    Create {
        /// Kind of resource to create.
        kind: ResourceKind,
        /// Sanitized resource payload.
        resource: Value,
    },
    /// Patch an existing resource.
    Update {
        /// Target resource.
        identifier: ResourceIdentifier,
        /// Patch with every `bulkId:` reference substituted.
        patch: ScimPatchRequest,
    },
    /// Delete an existing resource.
    Delete {
        /// Target resource.
        identifier: ResourceIdentifier,
    },
}

impl ProviderRequest {
    /// Short label for logs.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            ProviderRequest::Create { .. } => "create",
            ProviderRequest::Update { .. } => "update",
            ProviderRequest::Delete { .. } => "delete",
        }
    }

    /// Target resource, for update and delete.
    #[must_use]
    pub fn identifier(&self) -> Option<&ResourceIdentifier> {
        match self {
            ProviderRequest::Create { .. } => None,
            ProviderRequest::Update { identifier, .. }
            | ProviderRequest::Delete { identifier } => Some(identifier),
        }
    }
}
