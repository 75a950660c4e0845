//! Run configuration.
//!
//! Everything the pipeline needs is resolved here once, from the command line
//! and environment, and handed to each component by reference.

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use url::Url;

use crate::cli::{Cli, ExtraColumns};
use crate::elasticsearch::parse_host_url;
use crate::store::sql::validate_identifier;

/// Elasticsearch connection and pagination settings
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub host: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Documents requested per scroll page
    pub page_size: usize,
    /// Scroll context keep-alive, e.g. `1m`
    pub scroll_ttl: String,
    pub compress: bool,
}

/// MySQL connection settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

/// Which catalog entries are processed
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Explicit index names; empty means every index in the catalog
    pub indices: Vec<String>,
    pub include_hidden: bool,
}

#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub source: SourceConfig,
    pub store: StoreConfig,
    /// Rows per MySQL transaction
    pub batch_size: usize,
    pub output_dir: PathBuf,
    pub selection: Selection,
    pub extra_columns: ExtraColumns,
}

impl EtlConfig {
    pub fn from_cli(args: &Cli) -> Result<Self> {
        if args.page_size == 0 {
            return Err(anyhow!("--page-size must be greater than zero"));
        }
        if args.batch_size == 0 {
            return Err(anyhow!("--batch-size must be greater than zero"));
        }
        validate_identifier(&args.mysql_database)
            .map_err(|reason| anyhow!("invalid MySQL database name: {}", reason))?;

        let host = parse_host_url(
            &args.es_host,
            args.es_user.as_deref(),
            args.es_password.as_deref(),
        )?;

        let indices = args
            .indices
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            source: SourceConfig {
                host: host.url,
                username: host.username,
                password: host.password,
                page_size: args.page_size,
                scroll_ttl: args.scroll.clone(),
                compress: args.es_compress,
            },
            store: StoreConfig {
                host: args.mysql_host.clone(),
                port: args.mysql_port,
                user: args.mysql_user.clone(),
                password: args.mysql_password.clone(),
                database: args.mysql_database.clone(),
            },
            batch_size: args.batch_size,
            output_dir: PathBuf::from(&args.output_dir),
            selection: Selection {
                indices,
                include_hidden: args.include_hidden,
            },
            extra_columns: args.extra_columns,
        })
    }
}

impl Selection {
    /// Pick the indices to process: the whole catalog in catalog order, or the
    /// requested names in the order given.
    ///
    /// Explicitly requested names that are not in the catalog are returned
    /// separately so the caller can warn about them.
    pub fn apply(&self, catalog: &[String]) -> (Vec<String>, Vec<String>) {
        if self.indices.is_empty() {
            let selected = catalog
                .iter()
                .filter(|name| self.include_hidden || !name.starts_with('.'))
                .cloned()
                .collect();
            return (selected, Vec::new());
        }

        let mut selected = Vec::new();
        let mut missing = Vec::new();
        for name in &self.indices {
            if !catalog.contains(name) {
                missing.push(name.clone());
            } else if !selected.contains(name) {
                selected.push(name.clone());
            }
        }
        (selected, missing)
    }
}
