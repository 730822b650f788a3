//! Parsing of storage connection strings.
//!
//! Azure style strings are `Key=Value` pairs separated by `;`, for example
//! `DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=...;EndpointSuffix=core.windows.net`.
//! A `LocalRoot=<dir>` string selects a filesystem backed store where each
//! container is a sub-directory of `<dir>`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::blob_store::BlobError;

#[derive(Clone, PartialEq, Eq)]
pub enum StorageConnection {
    Azure(AzureConnection),
    Local { root: PathBuf },
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct AzureConnection {
    pub account: Option<String>,
    pub access_key: Option<String>,
    pub sas: Option<String>,
    pub endpoint: Option<String>,
    pub emulator: bool,
}

impl StorageConnection {
    pub fn parse(raw: &str) -> Result<Self, BlobError> {
        let pairs = parse_pairs(raw)?;

        if let Some(root) = pairs.get("localroot") {
            return Ok(StorageConnection::Local {
                root: PathBuf::from(root),
            });
        }

        let emulator = pairs
            .get("usedevelopmentstorage")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if emulator {
            return Ok(StorageConnection::Azure(AzureConnection {
                emulator: true,
                ..Default::default()
            }));
        }

        let blob_endpoint = pairs.get("blobendpoint").map(|e| e.trim_end_matches('/').to_string());
        let account = pairs
            .get("accountname")
            .cloned()
            .or_else(|| blob_endpoint.as_deref().and_then(account_from_endpoint));

        let account = account.ok_or_else(|| {
            BlobError::Configuration("connection string has no AccountName or BlobEndpoint".to_string())
        })?;

        let access_key = pairs.get("accountkey").cloned();
        let sas = pairs
            .get("sharedaccesssignature")
            .map(|s| s.trim_start_matches('?').to_string());
        if access_key.is_none() && sas.is_none() {
            return Err(BlobError::Configuration(
                "connection string has neither AccountKey nor SharedAccessSignature".to_string(),
            ));
        }

        let endpoint = blob_endpoint.or_else(|| {
            pairs.get("endpointsuffix").map(|suffix| {
                let protocol = pairs
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            })
        });

        Ok(StorageConnection::Azure(AzureConnection {
            account: Some(account),
            access_key,
            sas,
            endpoint,
            emulator: false,
        }))
    }
}

fn parse_pairs(raw: &str) -> Result<HashMap<String, String>, BlobError> {
    let mut pairs = HashMap::new();
    for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        // Values such as base64 keys may themselves contain '='.
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            BlobError::Configuration(format!("malformed connection string segment '{}'", redact(segment)))
        })?;
        pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    if pairs.is_empty() {
        return Err(BlobError::Configuration("connection string is empty".to_string()));
    }
    Ok(pairs)
}

fn account_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint.split("://").nth(1)?.split('/').next()?;
    host.split('.').next().filter(|a| !a.is_empty()).map(str::to_string)
}

fn redact(segment: &str) -> String {
    segment.chars().take(4).chain("***".chars()).collect()
}

impl fmt::Debug for AzureConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConnection")
            .field("account", &self.account)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("sas", &self.sas.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("emulator", &self.emulator)
            .finish()
    }
}

impl fmt::Debug for StorageConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageConnection::Azure(azure) => f.debug_tuple("Azure").field(azure).finish(),
            StorageConnection::Local { root } => f.debug_struct("Local").field("root", root).finish(),
        }
    }
}
