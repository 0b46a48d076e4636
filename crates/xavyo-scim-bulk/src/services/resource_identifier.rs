//! Resolution of request paths and URIs to typed resource identifiers.
//!
//! Resolution never fails loudly: a path that does not name a known resource
//! type (or names one that is not registered) simply yields `None`, which
//! callers treat as an ordinary not-found case.

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::error::{ScimError, ScimResult};
use crate::models::{ScimGroup, ScimUser};
use crate::services::extensions::{ExtensionRegistry, ResourceExtension};
use crate::services::filter_parser::{parse_filter, FilterExpr};

/// Kind of a SCIM resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Core User.
    User,
    /// Core Group.
    Group,
    /// Resource type contributed by an extension.
    Extension(ResourceExtension),
}

impl ResourceKind {
    /// Path segment of the Users endpoint.
    pub const USERS_PATH: &'static str = "Users";

    /// Path segment of the Groups endpoint.
    pub const GROUPS_PATH: &'static str = "Groups";

    /// Schema identifier of the resource type.
    #[must_use]
    pub fn schema_identifier(&self) -> &str {
        match self {
            ResourceKind::User => ScimUser::SCHEMA,
            ResourceKind::Group => ScimGroup::SCHEMA,
            ResourceKind::Extension(ext) => &ext.schema,
        }
    }

    /// Path segment the resource type is served under.
    #[must_use]
    pub fn path_segment(&self) -> &str {
        match self {
            ResourceKind::User => Self::USERS_PATH,
            ResourceKind::Group => Self::GROUPS_PATH,
            ResourceKind::Extension(ext) => &ext.path,
        }
    }

    /// Name reported in `meta.resourceType`.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        match self {
            ResourceKind::User => "User",
            ResourceKind::Group => "Group",
            ResourceKind::Extension(ext) => &ext.name,
        }
    }

    /// Whether `data` is a payload of this kind.
    ///
    /// A payload without a `schemas` list is accepted; a payload that lists
    /// schemas must include this kind's schema identifier.
    #[must_use]
    pub fn matches_schemas(&self, data: &Value) -> bool {
        match data.get("schemas").and_then(Value::as_array) {
            Some(schemas) if !schemas.is_empty() => schemas
                .iter()
                .filter_map(Value::as_str)
                .any(|s| s.eq_ignore_ascii_case(self.schema_identifier())),
            _ => true,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resource_type())
    }
}

/// 1-based pagination parameters (RFC 7644 Section 3.4.2.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationParameters {
    /// 1-based index of the first result.
    pub start_index: Option<u64>,
    /// Maximum number of results.
    pub count: Option<u64>,
}

/// Query parameters attached to a resource path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceQuery {
    /// Filter alternatives (a top-level `or` is split).
    pub filters: Vec<FilterExpr>,
    /// Attributes to return.
    pub attributes: Vec<String>,
    /// Attributes to leave out.
    pub excluded_attributes: Vec<String>,
    /// Paging, when either parameter was given.
    pub pagination: Option<PaginationParameters>,
}

impl ResourceQuery {
    /// Parse a query string (with or without the leading `?`).
    ///
    /// Parameter names are matched case-insensitively and unknown parameters
    /// are ignored. `startIndex` below 1 is read as 1 and a negative `count`
    /// as 0.
    pub fn parse(query: &str) -> ScimResult<Self> {
        let mut parsed = Self::default();
        let mut pagination = PaginationParameters::default();

        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.to_ascii_lowercase().as_str() {
                "filter" => parsed.filters = parse_filter(&value)?.into_alternatives(),
                "attributes" => parsed.attributes = split_list(&value),
                "excludedattributes" => parsed.excluded_attributes = split_list(&value),
                "startindex" => {
                    pagination.start_index = Some(parse_integer("startIndex", &value)?.max(1).unsigned_abs());
                }
                "count" => {
                    pagination.count = Some(parse_integer("count", &value)?.max(0).unsigned_abs());
                }
                _ => {}
            }
        }

        if pagination != PaginationParameters::default() {
            parsed.pagination = Some(pagination);
        }
        Ok(parsed)
    }

    /// Whether no parameter was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_integer(name: &str, value: &str) -> ScimResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| ScimError::BadRequest(format!("Invalid {name}: '{value}'")))
}

/// A resolved resource: kind, identifier and optional query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceIdentifier {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource identifier, URL-unescaped.
    pub identifier: String,
    /// Query parameters, when the URI had any.
    pub query: Option<ResourceQuery>,
}

impl ResourceIdentifier {
    /// Identifier without a query.
    pub fn new(kind: ResourceKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            query: None,
        }
    }

    /// Schema identifier of the resource kind.
    #[must_use]
    pub fn schema_identifier(&self) -> &str {
        self.kind.schema_identifier()
    }

    /// Absolute location of the resource under `base`.
    #[must_use]
    pub fn location(&self, base: &Url) -> String {
        format!(
            "{}/{}/{}",
            base.as_str().trim_end_matches('/'),
            self.kind.path_segment(),
            urlencoding::encode(&self.identifier)
        )
    }
}

/// Maps paths and URIs to [`ResourceIdentifier`]s.
#[derive(Debug, Clone)]
pub struct ResourceIdentifierResolver {
    base: Url,
    extensions: ExtensionRegistry,
    pattern: Regex,
}

impl ResourceIdentifierResolver {
    /// Build a resolver for the service rooted at `base`.
    pub fn new(base: Url, extensions: ExtensionRegistry) -> ScimResult<Self> {
        let segments: Vec<String> = [ResourceKind::USERS_PATH, ResourceKind::GROUPS_PATH]
            .into_iter()
            .map(regex::escape)
            .chain(extensions.iter().map(|e| regex::escape(&e.path)))
            .collect();
        let pattern = format!(
            r"(?i)^(?:.*?/)?(?P<kind>{})(?:/(?P<identifier>[^/]+))?/?$",
            segments.join("|")
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| ScimError::Internal(format!("Invalid resource path pattern: {e}")))?;

        Ok(Self {
            base,
            extensions,
            pattern,
        })
    }

    /// Base URL of the service.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Registered extension resource types.
    #[must_use]
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Resolve a URI naming a single resource (`/Users/2819c223`,
    /// `https://example.com/v2/Groups/e9e30dba?attributes=displayName`).
    #[must_use]
    pub fn try_resolve(&self, uri: &str) -> Option<ResourceIdentifier> {
        let (path, query) = split_uri(uri)?;
        let (kind, identifier) = self.capture(&path)?;
        let identifier = identifier?;

        let query = match query.as_deref().filter(|q| !q.is_empty()) {
            Some(raw) => match ResourceQuery::parse(raw) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::debug!(uri = %uri, error = %e, "Unresolvable resource query");
                    return None;
                }
            },
            None => None,
        };

        Some(ResourceIdentifier {
            kind,
            identifier,
            query,
        })
    }

    /// Resolve the resource kind of a collection or resource URI (`/Users`).
    #[must_use]
    pub fn try_resolve_kind(&self, uri: &str) -> Option<ResourceKind> {
        let (path, _) = split_uri(uri)?;
        self.capture(&path).map(|(kind, _)| kind)
    }

    fn capture(&self, path: &str) -> Option<(ResourceKind, Option<String>)> {
        let captures = self.pattern.captures(path)?;
        let segment = captures.name("kind")?.as_str();
        let kind = self.kind_for_segment(segment)?;

        let identifier = match captures.name("identifier") {
            Some(raw) => {
                let decoded = urlencoding::decode(raw.as_str()).ok()?.into_owned();
                Some(decoded).filter(|id| !id.trim().is_empty())
            }
            None => None,
        };
        Some((kind, identifier))
    }

    fn kind_for_segment(&self, segment: &str) -> Option<ResourceKind> {
        if segment.eq_ignore_ascii_case(ResourceKind::USERS_PATH) {
            Some(ResourceKind::User)
        } else if segment.eq_ignore_ascii_case(ResourceKind::GROUPS_PATH) {
            Some(ResourceKind::Group)
        } else {
            self.extensions
                .find_by_path(segment)
                .cloned()
                .map(ResourceKind::Extension)
        }
    }
}

/// Split a URI into path and query. Absolute URIs keep only their path.
fn split_uri(uri: &str) -> Option<(String, Option<String>)> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(uri) {
        if url.cannot_be_a_base() {
            return None;
        }
        return Some((url.path().to_string(), url.query().map(str::to_string)));
    }

    let without_fragment = uri.split('#').next().unwrap_or(uri);
    match without_fragment.split_once('?') {
        Some((path, query)) => Some((path.to_string(), Some(query.to_string()))),
        None => Some((without_fragment.to_string(), None)),
    }
}
