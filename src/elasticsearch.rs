use anyhow::{Context, Result, anyhow};
use base64::prelude::*;
use elasticsearch::{
    Elasticsearch,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
};
use http::header::{ACCEPT_ENCODING, AUTHORIZATION, HeaderMap, HeaderValue};
use url::Url;

use crate::config::SourceConfig;
use crate::error::EtlError;

/// Host URL and basic auth credentials extracted from `--es-host` and the credential flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Parse the host URL, stripping any path, and resolve credentials
pub fn parse_host_url(
    input: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<HostSpec> {
    let input_url = Url::parse(input).context("Failed to parse Elasticsearch host URL")?;
    log::debug!("Parsed host URL: {}", input_url);

    if !input_url.has_host() {
        return Err(anyhow!("No host in Elasticsearch URL: {}", input));
    }

    // --- Host Extraction ---
    let host_str = input_url.host_str().unwrap_or("localhost");
    let port_str = input_url
        .port()
        .map_or("".to_string(), |p| format!(":{}", p));
    let host_url_str = format!("{}://{}{}", input_url.scheme(), host_str, port_str);
    let url = Url::parse(&host_url_str)?;
    log::debug!("Extracted host URL: {}", url);

    // --- Authentication ---
    // Priority: Flags > URL > None
    let url_username = input_url.username();
    let url_password = input_url.password();

    let username = username
        .or_else(|| {
            if !url_username.is_empty() {
                Some(url_username)
            } else {
                None
            }
        })
        .map(|s| s.to_string());

    let password = password.or(url_password).map(|s| s.to_string());

    Ok(HostSpec {
        url,
        username,
        password,
    })
}

/// Create and configure the Elasticsearch client
pub fn create_client(config: &SourceConfig) -> Result<Elasticsearch> {
    log::debug!(
        "Setting up Elasticsearch client connection to {}",
        config.host.as_str()
    );
    let conn_pool = SingleNodeConnectionPool::new(config.host.clone());
    let mut transport_builder = TransportBuilder::new(conn_pool);

    let mut headers = HeaderMap::new();

    if let (Some(user), Some(pass)) = (config.username.as_deref(), config.password.as_deref()) {
        log::info!("Using basic authentication for user: {}", user);
        let auth_str = format!("{}:{}", user, pass);
        let auth_val = format!("Basic {}", BASE64_STANDARD.encode(auth_str));
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth_val)?);
    } else if config.username.is_some() || config.password.is_some() {
        log::warn!(
            "Partial basic auth credentials provided (username or password missing), ignoring."
        );
    }

    if !config.compress {
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    } else {
        log::debug!("Allowing Elasticsearch response compression (--esCompress specified)");
    }

    if !headers.is_empty() {
        transport_builder = transport_builder.headers(headers);
    }

    let transport = transport_builder
        .build()
        .context("Failed to build Elasticsearch transport")?;

    log::debug!("Elasticsearch client created successfully");
    Ok(Elasticsearch::new(transport))
}

/// Probe the cluster root with the configured credentials.
///
/// Any 200 response validates the credentials; any other status is an
/// authentication failure and an unreachable host a connection failure.
pub async fn validate_credentials(client: &Elasticsearch) -> Result<(), EtlError> {
    let response = client
        .info()
        .send()
        .await
        .map_err(|e| EtlError::Connection(e.to_string()))?;

    let status = response.status_code();
    if status.as_u16() != 200 {
        return Err(EtlError::Authentication(format!(
            "credential probe returned HTTP {}",
            status
        )));
    }

    log::info!("Elasticsearch credentials validated");
    Ok(())
}
