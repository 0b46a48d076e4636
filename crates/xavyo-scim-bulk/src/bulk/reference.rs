//! Substitution of `bulkId:` placeholders with real resource identifiers.

use http::StatusCode;

use crate::bulk::context::OperationContext;
use crate::bulk::response::OperationResponse;
use crate::bulk::state::OperationStatus;
use crate::error::ScimErrorType;
use crate::models::{bulk_id_reference, ScimPatchRequest};
use crate::services::ResourceIdentifierResolver;

/// Replace every reference to `producer` in `patch` with the identifier of
/// the resource it created.
///
/// The producer must have created its resource (Processed, or Pending on its
/// own subordinates) and recorded a location the resolver understands.
/// Failing that the consumer has no target and gets a 404 `noTarget` fault.
/// A consumer linked to a producer it does not actually reference is a
/// bookkeeping error and gets a 500 fault.
pub fn substitute_reference(
    producer: &OperationContext,
    resolver: &ResourceIdentifierResolver,
    patch: &mut ScimPatchRequest,
) -> Result<(), OperationResponse> {
    let Some(bulk_id) = producer.bulk_id() else {
        return Err(OperationResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Dependency {} has no bulkId", producer.label()),
            None,
        ));
    };
    let reference = bulk_id_reference(bulk_id);

    let created = matches!(
        producer.status(),
        OperationStatus::Processed | OperationStatus::Pending
    );
    let location = producer.location().filter(|_| created).ok_or_else(|| {
        OperationResponse::error(
            StatusCode::NOT_FOUND,
            format!("Referenced resource {reference} was not created"),
            Some(ScimErrorType::NoTarget),
        )
    })?;

    let identifier = resolver.try_resolve(location).ok_or_else(|| {
        OperationResponse::error(
            StatusCode::NOT_FOUND,
            format!("Location '{location}' of {reference} does not name a resource"),
            Some(ScimErrorType::NoTarget),
        )
    })?;

    let slots = patch.try_find_reference(bulk_id).ok_or_else(|| {
        OperationResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("No value references {reference}"),
            None,
        )
    })?;

    for slot in &slots {
        if !patch.replace_slot(slot, &identifier.identifier) {
            return Err(OperationResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Reference to {reference} vanished during substitution"),
                None,
            ));
        }
    }

    tracing::debug!(
        bulk_id = %bulk_id,
        identifier = %identifier.identifier,
        slots = slots.len(),
        "Substituted bulkId reference"
    );
    Ok(())
}
