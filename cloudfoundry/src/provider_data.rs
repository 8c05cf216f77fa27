//! Provider data structure passed to resources and data sources

use crate::api::Client;
use std::any::Any;
use std::sync::Arc;
use tfplug::types::Diagnostic;

#[derive(Clone)]
pub struct CloudFoundryProviderData {
    pub client: Arc<Client>,
}

impl CloudFoundryProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

/// Which kind of component is being configured, for diagnostics
#[derive(Debug, Clone, Copy)]
pub enum ConfigureTarget {
    Resource,
    DataSource,
}

/// Extract the provider data handed to `configure`.
///
/// `Ok(None)` when there is no provider data yet (metadata-only calls), an
/// error diagnostic when the data is of another type.
pub fn extract_provider_data(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    target: ConfigureTarget,
) -> Result<Option<CloudFoundryProviderData>, Diagnostic> {
    let Some(data) = provider_data else {
        tracing::trace!("No provider data, {:?} left unconfigured", target);
        return Ok(None);
    };

    match data.downcast_ref::<CloudFoundryProviderData>() {
        Some(provider_data) => Ok(Some(provider_data.clone())),
        None => {
            let summary = match target {
                ConfigureTarget::Resource => "Unexpected Resource Configure Type",
                ConfigureTarget::DataSource => "Unexpected Data Source Configure Type",
            };
            Err(Diagnostic::error(
                summary,
                "Expected CloudFoundryProviderData. Please report this issue to the provider developers.",
            ))
        }
    }
}

/// Client handle of a configured component, or the error for an unconfigured one
pub fn require_client(
    provider_data: &Option<CloudFoundryProviderData>,
) -> Result<Arc<Client>, Diagnostic> {
    provider_data
        .as_ref()
        .map(|data| data.client.clone())
        .ok_or_else(|| {
            Diagnostic::error(
                "Provider not configured",
                "Provider data was not properly configured",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_provider_data_is_not_an_error() {
        let result = extract_provider_data(None, ConfigureTarget::Resource);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn wrong_type_names_the_target() {
        let data: Arc<dyn Any + Send + Sync> = Arc::new(42u32);
        let err = extract_provider_data(Some(data), ConfigureTarget::DataSource)
            .err()
            .unwrap();
        assert_eq!(err.summary, "Unexpected Data Source Configure Type");
        assert!(err.detail.contains("CloudFoundryProviderData"));
    }

    #[test]
    fn provider_data_is_extracted() {
        let client = Client::new("https://api.example.com", "token", false).unwrap();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(CloudFoundryProviderData::new(client));

        let extracted = extract_provider_data(Some(data), ConfigureTarget::Resource)
            .unwrap()
            .unwrap();
        assert_eq!(extracted.client.base_url(), "https://api.example.com");
    }

    #[test]
    fn unconfigured_component_reports_provider_not_configured() {
        let err = require_client(&None).err().unwrap();
        assert_eq!(err.summary, "Provider not configured");
    }
}
