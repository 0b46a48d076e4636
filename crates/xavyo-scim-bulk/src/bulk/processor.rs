//! Bulk request driver.
//!
//! Validates a bulk request, builds and schedules its operation graph, then
//! runs the queue one operation at a time against a [`ResourceProvider`].

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::bulk::builder::GraphBuilder;
use crate::bulk::graph::BulkGraph;
use crate::bulk::response::{aggregate, OperationResponse};
use crate::bulk::scheduler::ExecutionQueue;
use crate::bulk::state::PrepareOutcome;
use crate::config::BulkConfig;
use crate::error::{BulkError, BulkResult};
use crate::models::{BulkRequest, BulkResponse};
use crate::provider::{ProviderRequest, ResourceProvider};
use crate::services::{ExtensionRegistry, ResourceIdentifier, ResourceIdentifierResolver};

/// Parse a bulk request body, enforcing the payload and operation limits.
pub fn parse_bulk_request(body: &[u8], config: &BulkConfig) -> BulkResult<BulkRequest> {
    if body.len() > config.max_payload_size {
        return Err(BulkError::PayloadTooLarge {
            size: body.len(),
            max: config.max_payload_size,
        });
    }

    let request: BulkRequest = serde_json::from_slice(body)?;
    validate_request(&request, config)?;
    Ok(request)
}

fn validate_request(request: &BulkRequest, config: &BulkConfig) -> BulkResult<()> {
    if !request.has_schema() {
        return Err(BulkError::InvalidRequest(format!(
            "schemas must contain {}",
            BulkRequest::SCHEMA
        )));
    }
    if request.operations.len() > config.max_operations {
        return Err(BulkError::TooManyOperations {
            count: request.operations.len(),
            max: config.max_operations,
        });
    }
    Ok(())
}

/// Executes SCIM bulk requests against a resource provider.
///
/// Holds no per-request state and can be shared between tasks.
pub struct BulkProcessor<P> {
    provider: P,
    config: BulkConfig,
    extensions: ExtensionRegistry,
}

impl<P: ResourceProvider> BulkProcessor<P> {
    /// Processor serving only Users and Groups.
    pub fn new(provider: P, config: BulkConfig) -> Self {
        Self {
            provider,
            config,
            extensions: ExtensionRegistry::new(),
        }
    }

    /// Serve the resource types in `extensions` as well.
    #[must_use]
    pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// The `bulk` member of the ServiceProviderConfig resource.
    pub fn service_provider_bulk(&self) -> Value {
        self.config.service_provider_bulk()
    }

    /// Parse `body` and process it.
    pub async fn process_body(&self, body: &[u8], base_uri: &str) -> BulkResult<BulkResponse> {
        let request = parse_bulk_request(body, &self.config)?;
        self.process(request, base_uri).await
    }

    /// Process a bulk request.
    ///
    /// `base_uri` is the absolute URL the SCIM service is mounted at; resource
    /// locations are built under it. Structural problems reject the whole
    /// request with an error; everything else ends up in the response.
    pub async fn process(&self, request: BulkRequest, base_uri: &str) -> BulkResult<BulkResponse> {
        let started = Instant::now();
        validate_request(&request, &self.config)?;

        let threshold = request
            .fail_on_errors
            .filter(|t| *t > 0)
            .or(self.config.default_fail_on_errors);

        info!(
            operations = request.operations.len(),
            fail_on_errors = ?threshold,
            "Processing SCIM bulk request"
        );

        let (mut graph, queue) = plan(&request, base_uri, self.extensions.clone())?;

        let mut executed = 0usize;
        for id in queue {
            if let Some(threshold) = threshold {
                let faulted = graph.faulted_count();
                if faulted >= usize::try_from(threshold).unwrap_or(usize::MAX) {
                    warn!(
                        faulted,
                        fail_on_errors = threshold,
                        "Bulk error threshold reached, skipping remaining operations"
                    );
                    break;
                }
            }

            if graph.get(id)?.is_completed() {
                continue;
            }
            match graph.try_prepare_request(id)? {
                PrepareOutcome::Ready(request) => {
                    let response = self.execute(&request, graph.resolver()).await;
                    executed += 1;
                    graph.complete(id, response)?;
                }
                PrepareOutcome::Faulted => {}
            }
        }

        let response = aggregate(&graph);
        info!(
            operations = response.operations.len(),
            executed,
            faulted = graph.faulted_count(),
            duration_ms = started.elapsed().as_millis(),
            "SCIM bulk request processed"
        );
        Ok(response)
    }

    async fn execute(
        &self,
        request: &ProviderRequest,
        resolver: &ResourceIdentifierResolver,
    ) -> OperationResponse {
        let base = resolver.base();
        let target = request.identifier().map(|identifier| identifier.location(base));

        let result = match request {
            ProviderRequest::Create { kind, resource } => self
                .provider
                .create(kind, resource.clone())
                .await
                .map(|created| match created_location(&created, base, kind) {
                    Some(location) => OperationResponse::created(created, Some(location)),
                    None => OperationResponse::error(
                        http::StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Created {kind} has neither id nor meta.location"),
                        None,
                    ),
                }),
            ProviderRequest::Update { identifier, patch } => {
                self.provider.update(identifier, patch).await.map(|updated| match updated {
                    Some(resource) => {
                        let location = meta_location(&resource).or_else(|| target.clone());
                        OperationResponse::ok(resource, location)
                    }
                    None => OperationResponse::no_content(target.clone()),
                })
            }
            ProviderRequest::Delete { identifier } => self
                .provider
                .delete(identifier)
                .await
                .map(|()| OperationResponse::no_content(target.clone())),
        };

        match result {
            Ok(response) => {
                debug!(
                    action = request.action(),
                    status = response.status.as_u16(),
                    location = ?response.location,
                    "Bulk operation executed"
                );
                response
            }
            Err(e) => {
                warn!(
                    action = request.action(),
                    target = ?target,
                    status = e.status_code().as_u16(),
                    error = %e,
                    "Bulk operation failed"
                );
                OperationResponse::from_scim_error(&e).with_location(target)
            }
        }
    }
}

fn meta_location(resource: &Value) -> Option<String> {
    resource
        .pointer("/meta/location")
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

/// `meta.location` of a created resource, else `<base>/<path>/<id>`.
fn created_location(
    resource: &Value,
    base: &Url,
    kind: &crate::services::ResourceKind,
) -> Option<String> {
    meta_location(resource).or_else(|| {
        let id = match resource.get("id")? {
            Value::String(id) if !id.is_empty() => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(ResourceIdentifier::new(kind.clone(), id).location(base))
    })
}

impl<P> std::fmt::Debug for BulkProcessor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkProcessor")
            .field("config", &self.config)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Build and schedule the graph of `request` without executing anything.
pub fn plan(
    request: &BulkRequest,
    base_uri: &str,
    extensions: ExtensionRegistry,
) -> BulkResult<(BulkGraph, ExecutionQueue)> {
    let base = Url::parse(base_uri.trim())
        .ok()
        .filter(|url| !url.cannot_be_a_base())
        .ok_or(BulkError::MissingBaseIdentifier)?;
    let resolver = ResourceIdentifierResolver::new(base, extensions)
        .map_err(|e| BulkError::InvalidRequest(e.to_string()))?;
    let mut graph = GraphBuilder::new(resolver).build(&request.operations)?;
    let queue = ExecutionQueue::schedule(&mut graph)?;
    Ok((graph, queue))
}
