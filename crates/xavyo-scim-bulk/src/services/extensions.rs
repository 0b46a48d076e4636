//! Registry of pluggable resource types beyond Users and Groups.

use crate::error::{ScimError, ScimResult};
use crate::services::resource_identifier::ResourceKind;

/// A resource type contributed by an extension, e.g. `Devices` with schema
/// `urn:example:scim:schemas:Device`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceExtension {
    /// Resource type name reported in `meta.resourceType`.
    pub name: String,
    /// Path segment the resource type is served under (no slashes).
    pub path: String,
    /// Schema identifier of the resource type.
    pub schema: String,
}

impl ResourceExtension {
    /// Create an extension; surrounding slashes in `path` are dropped.
    pub fn new(
        name: impl Into<String>,
        path: impl AsRef<str>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().trim_matches('/').to_string(),
            schema: schema.into(),
        }
    }
}

/// Set of registered extension resource types.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<ResourceExtension>,
}

impl ExtensionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension.
    ///
    /// Paths must be non-empty single segments and may not shadow the
    /// built-in `Users`/`Groups` endpoints or another extension.
    pub fn register(&mut self, extension: ResourceExtension) -> ScimResult<()> {
        if extension.path.is_empty() || extension.path.contains('/') {
            return Err(ScimError::Validation(format!(
                "Extension path '{}' must be a single path segment",
                extension.path
            )));
        }
        if extension.schema.trim().is_empty() {
            return Err(ScimError::Validation(format!(
                "Extension '{}' has no schema identifier",
                extension.name
            )));
        }

        let builtin = [ResourceKind::USERS_PATH, ResourceKind::GROUPS_PATH]
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&extension.path));
        if builtin || self.find_by_path(&extension.path).is_some() {
            return Err(ScimError::Validation(format!(
                "Extension path '{}' is already registered",
                extension.path
            )));
        }

        tracing::debug!(
            name = %extension.name,
            path = %extension.path,
            schema = %extension.schema,
            "Registered SCIM resource extension"
        );
        self.extensions.push(extension);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, extension: ResourceExtension) -> ScimResult<Self> {
        self.register(extension)?;
        Ok(self)
    }

    /// Extension served under `path` (case-insensitive).
    #[must_use]
    pub fn find_by_path(&self, path: &str) -> Option<&ResourceExtension> {
        self.extensions
            .iter()
            .find(|e| e.path.eq_ignore_ascii_case(path))
    }

    /// Extension with schema identifier `schema`.
    #[must_use]
    pub fn find_by_schema(&self, schema: &str) -> Option<&ResourceExtension> {
        self.extensions.iter().find(|e| e.schema == schema)
    }

    /// Registered extensions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceExtension> {
        self.extensions.iter()
    }

    /// Number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
