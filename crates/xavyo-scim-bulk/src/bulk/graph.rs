//! Arena of operation contexts and the transitions between their states.
//!
//! Contexts refer to each other by [`ContextId`]. All state changes go
//! through [`BulkGraph::prepare`] and [`BulkGraph::complete`], which enforce
//! the lifecycle and push faults downstream.

use http::StatusCode;

use crate::bulk::context::{ContextId, OperationContext, OperationPayload};
use crate::bulk::reference::substitute_reference;
use crate::bulk::response::OperationResponse;
use crate::bulk::state::{OperationState, OperationStatus, PrepareOutcome};
use crate::error::{BulkError, BulkResult, ScimErrorResponse, ScimErrorType};
use crate::models::{BulkMethod, BulkRequestOperation};
use crate::provider::ProviderRequest;
use crate::services::ResourceIdentifierResolver;

/// Operation contexts of one bulk request.
#[derive(Debug, Clone)]
pub struct BulkGraph {
    contexts: Vec<OperationContext>,
    resolver: ResourceIdentifierResolver,
    sealed: bool,
}

impl BulkGraph {
    /// Empty graph resolving paths with `resolver`.
    #[must_use]
    pub fn new(resolver: ResourceIdentifierResolver) -> Self {
        Self {
            contexts: Vec::new(),
            resolver,
            sealed: false,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &ResourceIdentifierResolver {
        &self.resolver
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Contexts in creation order: client operations in submission order,
    /// each followed by its subordinates.
    pub fn iter(&self) -> impl Iterator<Item = &OperationContext> {
        self.contexts.iter()
    }

    pub fn get(&self, id: ContextId) -> BulkResult<&OperationContext> {
        self.contexts
            .get(id.0)
            .ok_or(BulkError::UnknownContext(id.0))
    }

    fn get_mut(&mut self, id: ContextId) -> BulkResult<&mut OperationContext> {
        self.contexts
            .get_mut(id.0)
            .ok_or(BulkError::UnknownContext(id.0))
    }

    /// Context of the client operation with `bulk_id`.
    #[must_use]
    pub fn find_by_bulk_id(&self, bulk_id: &str) -> Option<&OperationContext> {
        self.contexts
            .iter()
            .find(|ctx| !ctx.is_subordinate() && ctx.bulk_id() == Some(bulk_id))
    }

    /// Number of faulted client operations.
    #[must_use]
    pub fn faulted_count(&self) -> usize {
        self.contexts
            .iter()
            .filter(|ctx| !ctx.is_subordinate() && ctx.status() == OperationStatus::Faulted)
            .count()
    }

    /// Whether scheduling has started.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Freeze the edges. Called when execution is scheduled.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Add a context. Subordinates are registered with their parent.
    pub(crate) fn push(
        &mut self,
        operation: BulkRequestOperation,
        method: BulkMethod,
        payload: OperationPayload,
        parent: Option<ContextId>,
    ) -> BulkResult<ContextId> {
        let id = ContextId(self.contexts.len());
        let label = match parent {
            Some(parent) => format!(
                "{} of {}",
                subordinate_label(&payload),
                self.get(parent)?.label()
            ),
            None => operation.describe(),
        };

        if let Some(parent) = parent {
            self.get_mut(parent)?.subordinates.push(id);
        }
        self.contexts
            .push(OperationContext::new(id, operation, method, payload, parent, label));
        Ok(id)
    }

    /// Record that `consumer` references the resource `producer` creates.
    ///
    /// Only allowed before scheduling, while the producer is still Received.
    pub fn link_dependency(&mut self, producer: ContextId, consumer: ContextId) -> BulkResult<()> {
        let producer_ctx = self.get(producer)?;
        self.get(consumer)?;

        if self.sealed || producer_ctx.status() != OperationStatus::Received {
            return Err(BulkError::GraphSealed {
                operation: producer_ctx.label().to_string(),
            });
        }
        if producer == consumer || producer_ctx.dependents.contains(&consumer) {
            return Ok(());
        }

        tracing::debug!(
            producer = %producer_ctx.label(),
            consumer = %self.get(consumer)?.label(),
            "Linked bulkId dependency"
        );
        self.get_mut(producer)?.dependents.push(consumer);
        self.get_mut(consumer)?.dependencies.push(producer);
        Ok(())
    }

    /// Resolve the provider request of a Received operation and prepare it.
    ///
    /// Resolution failures fault the operation and yield
    /// [`PrepareOutcome::Faulted`]; only contract violations are errors.
    pub fn try_prepare_request(&mut self, id: ContextId) -> BulkResult<PrepareOutcome> {
        let ctx = self.get(id)?;
        if ctx.status() != OperationStatus::Received {
            return Err(BulkError::InvalidStateTransition {
                operation: ctx.label().to_string(),
                from: ctx.status(),
                to: OperationStatus::Prepared,
            });
        }

        let resolved = match &ctx.payload {
            OperationPayload::Creation { kind, resource } => Ok(ProviderRequest::Create {
                kind: kind.clone(),
                resource: resource.clone(),
            }),
            OperationPayload::Deletion => self
                .resolver
                .try_resolve(&ctx.operation.path)
                .map(|identifier| ProviderRequest::Delete { identifier })
                .ok_or_else(|| {
                    OperationResponse::error(
                        StatusCode::BAD_REQUEST,
                        format!("Path '{}' does not name a resource", ctx.operation.path),
                        Some(ScimErrorType::InvalidPath),
                    )
                }),
            OperationPayload::Update { .. } => self.resolve_update(ctx)?,
        };

        match resolved {
            Ok(request) => {
                self.prepare(id, request.clone())?;
                Ok(PrepareOutcome::Ready(request))
            }
            Err(fault) => {
                tracing::debug!(
                    operation = %self.get(id)?.label(),
                    status = fault.status.as_u16(),
                    "Operation could not be prepared"
                );
                self.complete(id, fault)?;
                Ok(PrepareOutcome::Faulted)
            }
        }
    }

    fn resolve_update(
        &self,
        ctx: &OperationContext,
    ) -> BulkResult<Result<ProviderRequest, OperationResponse>> {
        let OperationPayload::Update { patch } = &ctx.payload else {
            return Ok(Err(OperationResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{} is not an update", ctx.label()),
                None,
            )));
        };

        let target = match ctx.parent {
            Some(parent) => {
                let parent = self.get(parent)?;
                let created = matches!(
                    parent.status(),
                    OperationStatus::Pending | OperationStatus::Processed
                );
                parent
                    .location()
                    .filter(|_| created)
                    .and_then(|location| self.resolver.try_resolve(location))
            }
            None => self.resolver.try_resolve(&ctx.operation.path),
        };
        let Some(identifier) = target else {
            return Ok(Err(OperationResponse::error(
                StatusCode::NOT_FOUND,
                format!("No target resource for {}", ctx.label()),
                Some(ScimErrorType::NoTarget),
            )));
        };

        let mut patch = patch.clone();
        for dependency in &ctx.dependencies {
            if let Err(fault) = substitute_reference(self.get(*dependency)?, &self.resolver, &mut patch) {
                return Ok(Err(fault));
            }
        }

        Ok(Ok(ProviderRequest::Update { identifier, patch }))
    }

    /// Move a Received operation to Prepared. Preparing again is a no-op.
    pub fn prepare(&mut self, id: ContextId, request: ProviderRequest) -> BulkResult<()> {
        let ctx = self.get_mut(id)?;
        match ctx.status() {
            OperationStatus::Received => {
                tracing::debug!(operation = %ctx.label, action = request.action(), "Operation prepared");
                ctx.state = OperationState::Prepared(request);
                Ok(())
            }
            OperationStatus::Prepared => Ok(()),
            from => Err(BulkError::InvalidStateTransition {
                operation: ctx.label.clone(),
                from,
                to: OperationStatus::Prepared,
            }),
        }
    }

    /// Record the outcome of an operation.
    ///
    /// Error responses fault the operation, anything else processes it. A
    /// successful creation with open subordinates waits in Pending instead.
    /// Completing again into the same terminal role keeps the first response.
    /// Faults travel on to dependents, to the parent of a subordinate, and to
    /// the subordinates of a creation that never produced a resource.
    pub fn complete(&mut self, id: ContextId, response: OperationResponse) -> BulkResult<()> {
        let mut work = vec![(id, response)];
        while let Some((id, response)) = work.pop() {
            self.complete_one(id, response, &mut work)?;
        }
        Ok(())
    }

    fn complete_one(
        &mut self,
        id: ContextId,
        response: OperationResponse,
        work: &mut Vec<(ContextId, OperationResponse)>,
    ) -> BulkResult<()> {
        let ctx = self.get(id)?;
        let from = ctx.status();
        let faulted = response.is_error();

        match (from, faulted) {
            (OperationStatus::Faulted, true)
            | (OperationStatus::Processed | OperationStatus::Pending, false) => return Ok(()),
            (OperationStatus::Prepared, _)
            | (OperationStatus::Received | OperationStatus::Pending, true) => {}
            (from, _) => {
                return Err(BulkError::InvalidStateTransition {
                    operation: ctx.label().to_string(),
                    from,
                    to: if faulted {
                        OperationStatus::Faulted
                    } else {
                        OperationStatus::Processed
                    },
                });
            }
        }

        let state = if faulted {
            OperationState::Faulted(response)
        } else {
            self.settle(ctx, response)?
        };
        self.set_state(id, state)?;

        let ctx = self.get(id)?;
        if ctx.status() == OperationStatus::Faulted {
            let label = ctx.label().to_string();
            let created = ctx.location().is_some() && ctx.is_creation();

            for dependent in &ctx.dependents {
                if self.get(*dependent)?.status() == OperationStatus::Received {
                    work.push((
                        *dependent,
                        OperationResponse::error(
                            StatusCode::NOT_FOUND,
                            format!("Referenced operation {label} failed"),
                            Some(ScimErrorType::NoTarget),
                        ),
                    ));
                }
            }
            if !created {
                for subordinate in &ctx.subordinates {
                    if self.get(*subordinate)?.status() == OperationStatus::Received {
                        work.push((
                            *subordinate,
                            OperationResponse::error(
                                StatusCode::NOT_FOUND,
                                format!("Parent operation {label} failed"),
                                Some(ScimErrorType::NoTarget),
                            ),
                        ));
                    }
                }
            }
        }

        if let Some(parent) = ctx.parent {
            if ctx.is_completed() {
                self.refresh_parent(parent, id, work)?;
            }
        }
        Ok(())
    }

    /// State of a successful operation: a creation waits for its subordinates
    /// and inherits the first subordinate fault.
    fn settle(
        &self,
        ctx: &OperationContext,
        response: OperationResponse,
    ) -> BulkResult<OperationState> {
        let mut open = false;
        for subordinate in &ctx.subordinates {
            let sub = self.get(*subordinate)?;
            match sub.status() {
                OperationStatus::Faulted => {
                    return Ok(OperationState::Faulted(subordinate_fault(
                        sub,
                        response.location,
                    )));
                }
                OperationStatus::Processed => {}
                _ => open = true,
            }
        }

        Ok(if open {
            OperationState::Pending(response)
        } else {
            OperationState::Processed(response)
        })
    }

    fn refresh_parent(
        &mut self,
        parent: ContextId,
        subordinate: ContextId,
        work: &mut Vec<(ContextId, OperationResponse)>,
    ) -> BulkResult<()> {
        let sub = self.get(subordinate)?;
        let parent_ctx = self.get(parent)?;

        match (parent_ctx.status(), sub.status()) {
            (OperationStatus::Received | OperationStatus::Pending, OperationStatus::Faulted) => {
                let location = parent_ctx.location().map(str::to_string);
                work.push((parent, subordinate_fault(sub, location)));
            }
            (OperationStatus::Pending, OperationStatus::Processed) => {
                let state = match &parent_ctx.state {
                    OperationState::Pending(response) => self.settle(parent_ctx, response.clone())?,
                    _ => return Ok(()),
                };
                match state {
                    OperationState::Faulted(fault) => work.push((parent, fault)),
                    OperationState::Processed(response) => {
                        self.set_state(parent, OperationState::Processed(response))?;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn set_state(&mut self, id: ContextId, state: OperationState) -> BulkResult<()> {
        let ctx = self.get_mut(id)?;
        let from = ctx.status();
        let to = state.status();
        ctx.state = state;

        match to {
            OperationStatus::Faulted => tracing::debug!(
                operation = %ctx.label,
                from = %from,
                status = ctx.response().map(|r| r.status.as_u16()),
                "Operation faulted"
            ),
            _ => tracing::debug!(operation = %ctx.label, from = %from, to = %to, "Operation state changed"),
        }
        Ok(())
    }
}

fn subordinate_label(payload: &OperationPayload) -> &'static str {
    match payload {
        OperationPayload::Update { patch } => {
            let manager = patch.operations.iter().any(|op| {
                op.path
                    .as_deref()
                    .is_some_and(|p| p.eq_ignore_ascii_case(crate::models::ScimUser::MANAGER_PATH))
            });
            if manager {
                "manager update"
            } else {
                "member update"
            }
        }
        _ => "subordinate",
    }
}

/// Fault of a parent caused by one of its subordinates.
fn subordinate_fault(subordinate: &OperationContext, location: Option<String>) -> OperationResponse {
    let detail = |cause: &str| format!("{} failed: {cause}", subordinate.label());
    let body = match subordinate.response().and_then(OperationResponse::error_body) {
        Some(error) => ScimErrorResponse {
            detail: detail(&error.detail),
            ..error.clone()
        },
        None => ScimErrorResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            detail("no error recorded"),
            None,
        ),
    };
    OperationResponse::from_error_body(body, location)
}
