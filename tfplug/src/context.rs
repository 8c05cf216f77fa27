//! Per-RPC context handed to every provider, resource and data source call
//!
//! The gRPC layer builds one Context per request. It carries the tracing
//! span the handler runs in, so log lines emitted by a provider are tagged
//! with the RPC name and the Terraform type name.

use std::sync::Arc;

#[derive(Clone)]
pub struct Context {
    span: Arc<tracing::Span>,
}

impl Context {
    /// Context outside of any RPC, used by tests and direct calls
    pub fn new() -> Self {
        Self {
            span: Arc::new(tracing::Span::none()),
        }
    }

    /// Context for one RPC, e.g. `Context::for_rpc("ApplyResourceChange", "cloudfoundry_org")`
    pub fn for_rpc(rpc: &'static str, type_name: &str) -> Self {
        Self {
            span: Arc::new(tracing::info_span!("tfplug_rpc", rpc, type_name)),
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_context_has_no_span() {
        assert!(Context::new().span().is_none());
    }

    #[test]
    fn clones_share_the_span() {
        let ctx = Context::for_rpc("ReadResource", "cloudfoundry_org");
        let clone = ctx.clone();
        assert_eq!(ctx.span().id(), clone.span().id());
    }
}
