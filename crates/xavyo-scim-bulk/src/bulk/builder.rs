//! Turns the operations of a bulk request into a [`BulkGraph`].
//!
//! One pass, left to right. Creations are checked against every update seen
//! before them and updates against every creation seen before them, so each
//! creation/update pair is looked at once whichever comes first.

use std::collections::HashSet;

use serde_json::Value;

use crate::bulk::context::{ContextId, OperationPayload};
use crate::bulk::graph::BulkGraph;
use crate::error::{BulkError, BulkResult};
use crate::models::{
    BulkMethod, BulkRequestOperation, ScimGroup, ScimPatchOp, ScimPatchRequest, ScimUser,
};
use crate::services::{ResourceIdentifierResolver, ResourceKind};

/// Builds the operation graph of one bulk request.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: BulkGraph,
    creations: Vec<ContextId>,
    updates: Vec<ContextId>,
    bulk_ids: HashSet<String>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(resolver: ResourceIdentifierResolver) -> Self {
        Self {
            graph: BulkGraph::new(resolver),
            creations: Vec::new(),
            updates: Vec::new(),
            bulk_ids: HashSet::new(),
        }
    }

    /// Build the graph, rejecting the whole request on the first structural
    /// problem.
    pub fn build(mut self, operations: &[BulkRequestOperation]) -> BulkResult<BulkGraph> {
        for (index, operation) in operations.iter().enumerate() {
            self.add(index, operation)?;
        }

        tracing::debug!(
            operations = operations.len(),
            contexts = self.graph.len(),
            "Bulk operation graph built"
        );
        Ok(self.graph)
    }

    fn add(&mut self, index: usize, operation: &BulkRequestOperation) -> BulkResult<()> {
        let method =
            BulkMethod::parse(&operation.method).ok_or_else(|| BulkError::UnsupportedMethod {
                index,
                method: operation.method.clone(),
            })?;

        if let Some(bulk_id) = &operation.bulk_id {
            if bulk_id.trim().is_empty() {
                return Err(invalid(index, "bulkId must not be empty"));
            }
            if !self.bulk_ids.insert(bulk_id.clone()) {
                return Err(BulkError::DuplicateBulkId(bulk_id.clone()));
            }
        }

        match method {
            BulkMethod::Post => self.add_creation(index, operation),
            BulkMethod::Patch => self.add_update(index, operation),
            BulkMethod::Delete => self.add_deletion(index, operation),
        }
    }

    fn add_creation(&mut self, index: usize, operation: &BulkRequestOperation) -> BulkResult<()> {
        let Some(bulk_id) = operation.bulk_id.as_deref() else {
            return Err(invalid(index, "POST requires a bulkId"));
        };
        let data = match &operation.data {
            Some(data @ Value::Object(_)) => data.clone(),
            _ => return Err(invalid(index, "POST requires a resource object in data")),
        };

        let resolver = self.graph.resolver();
        if resolver.try_resolve(&operation.path).is_some() {
            return Err(invalid(
                index,
                format!("POST path '{}' must name a resource type", operation.path),
            ));
        }
        let kind = resolver.try_resolve_kind(&operation.path).ok_or_else(|| {
            invalid(
                index,
                format!("Unknown resource type path '{}'", operation.path),
            )
        })?;
        if !kind.matches_schemas(&data) {
            return Err(invalid(
                index,
                format!("data does not declare the {} schema", kind.schema_identifier()),
            ));
        }

        let (resource, relational) = split_relational(index, &kind, data)?;
        let creation = self.graph.push(
            operation.clone(),
            BulkMethod::Post,
            OperationPayload::Creation { kind, resource },
            None,
        )?;

        let mut consumers = Vec::new();
        for &update in &self.updates {
            if self.references(update, bulk_id)? {
                consumers.push(update);
            }
        }
        for consumer in consumers {
            self.graph.link_dependency(creation, consumer)?;
        }
        self.creations.push(creation);

        for patch in relational {
            let subordinate = BulkRequestOperation {
                method: BulkMethod::Patch.as_str().to_string(),
                bulk_id: None,
                version: None,
                path: operation.path.clone(),
                data: Some(serde_json::to_value(&patch)?),
            };
            let id = self.graph.push(
                subordinate,
                BulkMethod::Patch,
                OperationPayload::Update { patch },
                Some(creation),
            )?;
            self.link_to_creations(id)?;
            self.updates.push(id);
        }
        Ok(())
    }

    fn add_update(&mut self, index: usize, operation: &BulkRequestOperation) -> BulkResult<()> {
        if operation.path.trim().is_empty() {
            return Err(invalid(index, "PATCH requires a path"));
        }
        let data = operation
            .data
            .clone()
            .ok_or_else(|| invalid(index, "PATCH requires a PatchOp in data"))?;
        let patch: ScimPatchRequest = serde_json::from_value(data)
            .map_err(|e| invalid(index, format!("Invalid PatchOp: {e}")))?;
        patch.validate().map_err(|reason| invalid(index, reason))?;

        let update = self.graph.push(
            operation.clone(),
            BulkMethod::Patch,
            OperationPayload::Update { patch },
            None,
        )?;
        self.link_to_creations(update)?;
        self.updates.push(update);
        Ok(())
    }

    fn add_deletion(&mut self, index: usize, operation: &BulkRequestOperation) -> BulkResult<()> {
        if operation.path.trim().is_empty() {
            return Err(invalid(index, "DELETE requires a path"));
        }
        self.graph.push(
            operation.clone(),
            BulkMethod::Delete,
            OperationPayload::Deletion,
            None,
        )?;
        Ok(())
    }

    /// Link `consumer` to every creation seen so far that it references.
    fn link_to_creations(&mut self, consumer: ContextId) -> BulkResult<()> {
        let mut producers = Vec::new();
        for &creation in &self.creations {
            if let Some(bulk_id) = self.graph.get(creation)?.bulk_id() {
                if self.references(consumer, bulk_id)? {
                    producers.push(creation);
                }
            }
        }
        for producer in producers {
            self.graph.link_dependency(producer, consumer)?;
        }
        Ok(())
    }

    fn references(&self, consumer: ContextId, bulk_id: &str) -> BulkResult<bool> {
        Ok(match self.graph.get(consumer)?.payload() {
            OperationPayload::Update { patch } => patch.references(bulk_id),
            _ => false,
        })
    }
}

fn invalid(index: usize, reason: impl Into<String>) -> BulkError {
    BulkError::InvalidOperation {
        index,
        reason: reason.into(),
    }
}

/// Strip attributes that cannot be set at creation time and turn each value
/// into a PATCH: the manager of a user, and every member of a group.
///
/// Only the relational attributes are inspected; the rest of the payload is
/// handed to the provider exactly as sent.
fn split_relational(
    index: usize,
    kind: &ResourceKind,
    data: Value,
) -> BulkResult<(Value, Vec<ScimPatchRequest>)> {
    let not_an_object = || invalid(index, "POST requires a resource object in data");
    match kind {
        ResourceKind::User => {
            let mut user = ScimUser::from_value(data).ok_or_else(not_an_object)?;
            let manager = user.take_manager().map_err(|reason| invalid(index, reason))?;
            let patches = match manager {
                Some(manager) => vec![ScimPatchRequest::new(vec![ScimPatchOp::add(
                    ScimUser::MANAGER_PATH,
                    serde_json::to_value(&manager)?,
                )])],
                None => Vec::new(),
            };
            Ok((user.into_value(), patches))
        }
        ResourceKind::Group => {
            let mut group = ScimGroup::from_value(data).ok_or_else(not_an_object)?;
            let patches = group
                .take_members()
                .map_err(|reason| invalid(index, reason))?
                .iter()
                .map(|member| {
                    Ok(ScimPatchRequest::new(vec![ScimPatchOp::add(
                        ScimGroup::MEMBERS_PATH,
                        Value::Array(vec![serde_json::to_value(member)?]),
                    )]))
                })
                .collect::<BulkResult<Vec<_>>>()?;
            Ok((group.into_value(), patches))
        }
        ResourceKind::Extension(_) => Ok((data, Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ExtensionRegistry;
    use serde_json::json;
    use url::Url;

    fn builder() -> GraphBuilder {
        GraphBuilder::new(
            ResourceIdentifierResolver::new(
                Url::parse("https://example.com/v2").unwrap(),
                ExtensionRegistry::new(),
            )
            .unwrap(),
        )
    }

    fn op(method: &str, bulk_id: Option<&str>, path: &str, data: Option<Value>) -> BulkRequestOperation {
        BulkRequestOperation {
            method: method.to_string(),
            bulk_id: bulk_id.map(str::to_string),
            version: None,
            path: path.to_string(),
            data,
        }
    }

    fn post_user(bulk_id: &str) -> BulkRequestOperation {
        op(
            "POST",
            Some(bulk_id),
            "/Users",
            Some(json!({ "schemas": [ScimUser::SCHEMA], "userName": bulk_id })),
        )
    }

    fn patch_members(path: &str, reference: &str) -> BulkRequestOperation {
        op(
            "PATCH",
            None,
            path,
            Some(json!({
                "schemas": [ScimPatchRequest::SCHEMA],
                "Operations": [{
                    "op": "add",
                    "path": "members",
                    "value": [{ "value": format!("bulkId:{reference}") }]
                }]
            })),
        )
    }

    #[test]
    fn test_put_rejects_whole_request() {
        let err = builder()
            .build(&[post_user("a"), op("PUT", None, "/Users/1", Some(json!({})))])
            .unwrap_err();

        assert!(matches!(err, BulkError::UnsupportedMethod { index: 1, .. }));
        assert!(err.is_structural());
    }

    #[test]
    fn test_duplicate_bulk_id() {
        let err = builder()
            .build(&[post_user("a"), post_user("a")])
            .unwrap_err();
        assert!(matches!(err, BulkError::DuplicateBulkId(id) if id == "a"));
    }

    #[test]
    fn test_post_requirements() {
        let cases = [
            op("POST", None, "/Users", Some(json!({ "userName": "x" }))),
            op("POST", Some("a"), "/Users", None),
            op("POST", Some("a"), "/Users/42", Some(json!({ "userName": "x" }))),
            op("POST", Some("a"), "/Widgets", Some(json!({ "userName": "x" }))),
            op(
                "POST",
                Some("a"),
                "/Users",
                Some(json!({ "schemas": [ScimGroup::SCHEMA], "displayName": "x" })),
            ),
        ];
        for case in cases {
            let err = builder().build(&[case]).unwrap_err();
            assert!(matches!(err, BulkError::InvalidOperation { index: 0, .. }), "{err}");
        }
    }

    #[test]
    fn test_patch_and_delete_requirements() {
        assert!(builder().build(&[op("DELETE", None, "", None)]).is_err());
        assert!(builder().build(&[op("PATCH", None, "/Users/1", None)]).is_err());
        assert!(builder()
            .build(&[op("PATCH", None, "/Users/1", Some(json!({ "Operations": [] })))])
            .is_err());
    }

    #[test]
    fn test_update_after_creation_is_linked() {
        let graph = builder()
            .build(&[post_user("a"), patch_members("/Groups/g1", "a")])
            .unwrap();

        let creation = graph.find_by_bulk_id("a").unwrap();
        let update = graph.iter().nth(1).unwrap();
        assert_eq!(creation.dependents(), &[update.id()]);
        assert_eq!(update.dependencies(), &[creation.id()]);
    }

    #[test]
    fn test_forward_reference_is_linked() {
        let graph = builder()
            .build(&[patch_members("/Groups/g1", "a"), post_user("a")])
            .unwrap();

        let update = graph.iter().next().unwrap();
        let creation = graph.find_by_bulk_id("a").unwrap();
        assert_eq!(update.dependencies(), &[creation.id()]);
    }

    #[test]
    fn test_manager_split() {
        let graph = builder()
            .build(&[op(
                "POST",
                Some("u1"),
                "/Users",
                Some(json!({
                    "schemas": [ScimUser::SCHEMA, ScimUser::ENTERPRISE_SCHEMA],
                    "userName": "u1",
                    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                        "manager": { "value": "m-42" }
                    }
                })),
            )])
            .unwrap();

        assert_eq!(graph.len(), 2);
        let creation = graph.find_by_bulk_id("u1").unwrap();
        let OperationPayload::Creation { resource, .. } = creation.payload() else {
            panic!("expected creation");
        };
        assert!(resource.get(ScimUser::ENTERPRISE_SCHEMA).is_none());
        assert_eq!(resource["schemas"], json!([ScimUser::SCHEMA]));

        let manager = graph.get(creation.subordinates()[0]).unwrap();
        assert_eq!(manager.parent(), Some(creation.id()));
        let OperationPayload::Update { patch } = manager.payload() else {
            panic!("expected update");
        };
        assert_eq!(patch.operations[0].path.as_deref(), Some(ScimUser::MANAGER_PATH));
        assert_eq!(patch.operations[0].value, Some(json!({ "value": "m-42" })));
    }

    #[test]
    fn test_group_members_split_and_linked() {
        let graph = builder()
            .build(&[
                post_user("alice"),
                op(
                    "POST",
                    Some("g"),
                    "/Groups",
                    Some(json!({
                        "schemas": [ScimGroup::SCHEMA],
                        "displayName": "Engineering",
                        "members": [
                            { "value": "bulkId:alice" },
                            { "value": "bulkId:bob" },
                            { "value": "existing-id" }
                        ]
                    })),
                ),
                post_user("bob"),
            ])
            .unwrap();

        // alice, group, three member patches, bob
        assert_eq!(graph.len(), 6);
        let group = graph.find_by_bulk_id("g").unwrap();
        assert_eq!(group.subordinates().len(), 3);
        let OperationPayload::Creation { resource, .. } = group.payload() else {
            panic!("expected creation");
        };
        assert!(resource.get("members").is_none());

        let alice = graph.find_by_bulk_id("alice").unwrap();
        let bob = graph.find_by_bulk_id("bob").unwrap();
        assert_eq!(alice.dependents(), &[group.subordinates()[0]]);
        assert_eq!(bob.dependents(), &[group.subordinates()[1]]);
        assert!(graph
            .get(group.subordinates()[2])
            .unwrap()
            .dependencies()
            .is_empty());
    }

    #[test]
    fn test_user_without_manager_is_untouched() {
        let data = json!({
            "schemas": [ScimUser::SCHEMA],
            "userName": "plain",
            "nickName": null
        });
        let graph = builder()
            .build(&[op("POST", Some("p"), "/Users", Some(data.clone()))])
            .unwrap();

        let OperationPayload::Creation { resource, .. } = graph.iter().next().unwrap().payload() else {
            panic!("expected creation");
        };
        assert_eq!(resource, &data);
    }

    fn post_user_with_manager(bulk_id: &str, manager: Value, extra: Value) -> BulkRequestOperation {
        let mut data = json!({
            "userName": bulk_id,
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": { "manager": manager }
        });
        if let (Some(data), Value::Object(extra)) = (data.as_object_mut(), extra) {
            data.extend(extra);
        }
        op("POST", Some(bulk_id), "/Users", Some(data))
    }

    #[test]
    fn test_manager_split_ignores_unrelated_attribute_types() {
        let extras = [
            json!({ "active": "true" }),
            json!({ "meta": { "created": "last tuesday" } }),
            json!({ "name": 42, "emails": "jane@example.com" }),
        ];
        for extra in extras {
            let graph = builder()
                .build(&[
                    post_user_with_manager("u0", json!({ "value": "bulkId:u1" }), extra.clone()),
                    post_user("u1"),
                ])
                .unwrap();

            // u0, its manager patch, u1
            assert_eq!(graph.len(), 3, "{extra}");
            let u0 = graph.find_by_bulk_id("u0").unwrap();
            let u1 = graph.find_by_bulk_id("u1").unwrap();
            assert_eq!(u0.subordinates().len(), 1);
            assert_eq!(u1.dependents(), u0.subordinates());

            let OperationPayload::Creation { resource, .. } = u0.payload() else {
                panic!("expected creation");
            };
            assert!(resource.get(ScimUser::ENTERPRISE_SCHEMA).is_none());
            for (key, value) in extra.as_object().unwrap() {
                assert_eq!(&resource[key], value);
            }
        }
    }

    #[test]
    fn test_split_does_not_add_schemas() {
        let graph = builder()
            .build(&[post_user_with_manager("u0", json!({ "value": "m-1" }), json!({}))])
            .unwrap();

        let OperationPayload::Creation { resource, .. } = graph.iter().next().unwrap().payload() else {
            panic!("expected creation");
        };
        assert_eq!(resource, &json!({ "userName": "u0" }));
    }

    #[test]
    fn test_malformed_relational_attributes_reject_request() {
        let cases = [
            post_user_with_manager("u0", json!("bulkId:u1"), json!({})),
            post_user_with_manager("u0", json!({ "value": 7 }), json!({})),
            op(
                "POST",
                Some("g"),
                "/Groups",
                Some(json!({ "displayName": "Ops", "members": "bulkId:u1" })),
            ),
            op(
                "POST",
                Some("g"),
                "/Groups",
                Some(json!({ "displayName": "Ops", "members": [{ "display": "no value" }] })),
            ),
        ];
        for case in cases {
            let err = builder().build(&[post_user("u1"), case]).unwrap_err();
            assert!(matches!(err, BulkError::InvalidOperation { index: 1, .. }), "{err}");
            assert!(err.is_structural());
        }
    }

    #[test]
    fn test_group_members_split_without_display_name() {
        let graph = builder()
            .build(&[op(
                "POST",
                Some("g"),
                "/Groups",
                Some(json!({ "members": [{ "value": "existing-id" }], "active": "yes" })),
            )])
            .unwrap();

        let group = graph.find_by_bulk_id("g").unwrap();
        assert_eq!(group.subordinates().len(), 1);
        let OperationPayload::Creation { resource, .. } = group.payload() else {
            panic!("expected creation");
        };
        assert_eq!(resource, &json!({ "active": "yes" }));
    }
}
