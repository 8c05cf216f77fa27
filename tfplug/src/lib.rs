//! Terraform plugin protocol v6 for Rust providers
//!
//! A provider implements [`Provider`] and registers factories for its
//! resources and data sources. [`serve`] runs the go-plugin handshake and the
//! gRPC service that Terraform talks to. Values cross the wire as msgpack and
//! reach provider code as [`DynamicValue`]s checked against the declared
//! [`Schema`].

pub mod context;
pub mod data_source;
pub mod defaults;
pub mod error;
pub mod grpc;
pub mod import;
pub mod plan_modifier;
pub mod proto;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod server;
pub mod types;
pub mod validator;

pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
pub use server::{serve, LogLevel, ServerConfig};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
