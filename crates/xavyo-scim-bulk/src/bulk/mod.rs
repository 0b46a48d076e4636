//! SCIM bulk operation engine (RFC 7644 Section 3.7).
//!
//! A request is turned into a graph of [`OperationContext`]s
//! ([`GraphBuilder`]), ordered so that every `bulkId` producer runs before
//! its consumers ([`ExecutionQueue`]) and executed by the
//! [`BulkProcessor`].

pub mod builder;
pub mod context;
pub mod graph;
pub mod processor;
pub mod reference;
pub mod response;
pub mod scheduler;
pub mod state;

pub use builder::GraphBuilder;
pub use context::{ContextId, OperationContext, OperationPayload};
pub use graph::BulkGraph;
pub use processor::{parse_bulk_request, plan, BulkProcessor};
pub use reference::substitute_reference;
pub use response::{aggregate, OperationResponse, ResponseBody};
pub use scheduler::ExecutionQueue;
pub use state::{OperationState, OperationStatus, PrepareOutcome};
