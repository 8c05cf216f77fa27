use cloudfoundry::CloudFoundryProvider;
use tfplug::{LogLevel, ServerConfig};

#[tokio::main]
async fn main() -> tfplug::Result<()> {
    // stdout carries the plugin handshake, logs go to stderr for Terraform to collect
    tracing_subscriber::fmt()
        .with_max_level(LogLevel::from_env().as_tracing_level())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        cert = %config.cert_path.display(),
        "starting Cloud Foundry provider"
    );

    tfplug::serve(CloudFoundryProvider::new(), config).await
}
