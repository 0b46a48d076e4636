//! Operation lifecycle.
//!
//! ```text
//! Received ──prepare──▶ Prepared ──complete──▶ Processed | Faulted
//!    │                     │
//!    │                     └─(creation with open subordinates)─▶ Pending ──▶ Processed | Faulted
//!    └──────────pre-empted fault──────────────▶ Faulted
//! ```

use crate::bulk::response::OperationResponse;
use crate::provider::ProviderRequest;

/// State of an operation without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    Received,
    Prepared,
    Pending,
    Processed,
    Faulted,
}

impl OperationStatus {
    /// Processed or Faulted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Faulted)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Prepared => "prepared",
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Faulted => "faulted",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of an operation together with what it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationState {
    /// Parsed, not yet scheduled for execution.
    Received,
    /// Request resolved and ready for the provider.
    Prepared(ProviderRequest),
    /// Creation succeeded; waiting for its subordinates.
    Pending(OperationResponse),
    /// Completed successfully.
    Processed(OperationResponse),
    /// Completed with an error.
    Faulted(OperationResponse),
}

impl OperationState {
    #[must_use]
    pub fn status(&self) -> OperationStatus {
        match self {
            OperationState::Received => OperationStatus::Received,
            OperationState::Prepared(_) => OperationStatus::Prepared,
            OperationState::Pending(_) => OperationStatus::Pending,
            OperationState::Processed(_) => OperationStatus::Processed,
            OperationState::Faulted(_) => OperationStatus::Faulted,
        }
    }

    /// Response recorded so far, if any.
    #[must_use]
    pub fn response(&self) -> Option<&OperationResponse> {
        match self {
            OperationState::Pending(r) | OperationState::Processed(r) | OperationState::Faulted(r) => {
                Some(r)
            }
            OperationState::Received | OperationState::Prepared(_) => None,
        }
    }

    /// Prepared request, while prepared.
    #[must_use]
    pub fn request(&self) -> Option<&ProviderRequest> {
        match self {
            OperationState::Prepared(request) => Some(request),
            _ => None,
        }
    }
}

/// Result of [`BulkGraph::try_prepare_request`](crate::bulk::BulkGraph::try_prepare_request).
#[derive(Debug, Clone, PartialEq)]
pub enum PrepareOutcome {
    /// The operation is prepared; run this request.
    Ready(ProviderRequest),
    /// The operation could not be resolved and has been faulted.
    Faulted,
}
