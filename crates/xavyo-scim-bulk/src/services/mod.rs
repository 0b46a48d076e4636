//! Services the bulk engine is built on.

pub mod extensions;
pub mod filter_parser;
pub mod resource_identifier;

pub use extensions::{ExtensionRegistry, ResourceExtension};
pub use filter_parser::{parse_filter, CompareOp, FilterExpr, FilterParser, FilterValue, LogicalOp};
pub use resource_identifier::{
    PaginationParameters, ResourceIdentifier, ResourceIdentifierResolver, ResourceKind,
    ResourceQuery,
};
