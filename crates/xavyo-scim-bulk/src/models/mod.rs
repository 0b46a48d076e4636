//! SCIM message and resource models used by the bulk engine.

pub mod bulk;
pub mod patch;
pub mod scim_group;
pub mod scim_user;

pub use bulk::{BulkMethod, BulkRequest, BulkRequestOperation, BulkResponse, BulkResponseOperation};
pub use patch::{bulk_id_reference, PatchOpKind, ScimPatchOp, ScimPatchRequest, ValueSlot, BULK_ID_PREFIX};
pub use scim_group::{ScimGroup, ScimGroupMember};
pub use scim_user::{ScimManager, ScimUser};
