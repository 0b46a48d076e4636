//! SCIM 2.0 bulk operation engine for xavyo
//!
//! This crate implements the server side of SCIM bulk requests (RFC 7644
//! Section 3.7): many POST, PATCH and DELETE operations in one call, linked
//! to each other through client-chosen `bulkId`s.
//!
//! # Features
//!
//! - `bulkId:` references resolved in any direction, forward references included
//! - Manager and group membership split into follow-up PATCH operations
//! - Failure propagation along references, `failOnErrors` handling
//! - Pluggable storage through the [`ResourceProvider`] trait
//! - Extension resource types next to Users and Groups
//! - Limits configurable from the environment
//!
//! # Usage
//!
//! ```rust,ignore
//! use xavyo_scim_bulk::{BulkConfig, BulkProcessor};
//!
//! let processor = BulkProcessor::new(provider, BulkConfig::from_env()?);
//! let response = processor
//!     .process_body(&body, "https://idp.example.com/scim/v2")
//!     .await?;
//! ```

pub mod bulk;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod services;

pub use bulk::{BulkProcessor, OperationResponse, OperationStatus};
pub use config::{BulkConfig, ConfigError};
pub use error::{BulkError, BulkResult, ScimError, ScimErrorResponse, ScimErrorType, ScimResult};
pub use models::{BulkRequest, BulkRequestOperation, BulkResponse, BulkResponseOperation};
pub use provider::{ProviderRequest, ResourceProvider};
pub use services::{ExtensionRegistry, ResourceExtension, ResourceIdentifier, ResourceKind};
