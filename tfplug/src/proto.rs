//! Protocol buffer types for Terraform Plugin Protocol v6
//!
//! Generated at build time by tonic_build from `proto/tfplugin6.proto`.
//!
//! Several messages share their names with framework types (`DynamicValue`,
//! `Diagnostic`, `Schema`, `AttributePath`), so always refer to these through
//! the `proto::` prefix.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::ProviderServer;
