//! Server module for running Terraform providers
//!
//! Starts the tfplugin6 gRPC server over TLS and prints the go-plugin
//! handshake line Terraform waits for on stdout.

use crate::error::{Result, TfplugError};
use crate::grpc::ProviderService;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use std::path::PathBuf;
use std::time::Duration;
use tonic::transport::{Identity, Server, ServerTlsConfig};

pub const CERT_PATH_ENV: &str = "TFPLUG_CERT_PATH";
pub const KEY_PATH_ENV: &str = "TFPLUG_KEY_PATH";

/// Log level for the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a Terraform style level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`).
    /// `JSON` is Terraform's alias for trace output.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "JSON" => Some(Self::Trace),
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARN" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Level from `TF_LOG_PROVIDER`, then `TF_LOG`
    pub fn from_env() -> Self {
        ["TF_LOG_PROVIDER", "TF_LOG"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find_map(|value| Self::parse(&value))
            .unwrap_or(Self::Info)
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to TLS certificate file
    pub cert_path: PathBuf,
    /// Path to TLS key file
    pub key_path: PathBuf,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    pub log_level: LogLevel,
    /// Timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("./certs/localhost.pem"),
            key_path: PathBuf::from("./certs/localhost-key.pem"),
            max_message_size: 256 << 20, // 256MB
            log_level: LogLevel::Info,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `TFPLUG_CERT_PATH`, `TFPLUG_KEY_PATH` and the
    /// Terraform log level variables
    pub fn from_env() -> Self {
        let mut config = Self::default().with_log_level(LogLevel::from_env());
        if let Ok(path) = std::env::var(CERT_PATH_ENV) {
            config = config.with_cert_path(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(KEY_PATH_ENV) {
            config = config.with_key_path(PathBuf::from(path));
        }
        config
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = path;
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = path;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    // tonic's rustls backend needs a process wide crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let provider_service = ProviderServer::new(ProviderService::new(provider))
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let cert = read_pem(&config.cert_path).await?;
    let key = read_pem(&config.key_path).await?;

    let tls_config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "plugin server listening");

    println!("{}", handshake_line(&addr));

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let shutdown_timeout = config.shutdown_timeout;
    Server::builder()
        .tls_config(tls_config)?
        .add_service(provider_service)
        .serve_with_incoming_shutdown(incoming, async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!(?shutdown_timeout, "shutting down plugin server");
        })
        .await?;

    Ok(())
}

async fn read_pem(path: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|source| TfplugError::Certificate {
            path: path.to_path_buf(),
            source,
        })
}

/// go-plugin handshake: core protocol version, app protocol version, network, address, protocol
pub fn handshake_line(addr: &std::net::SocketAddr) -> String {
    format!("1|6|tcp|{}|grpc", addr)
}
