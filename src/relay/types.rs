//! Block-engine JSON-RPC wire types

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, T> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: T,
}

impl<'a, T> JsonRpcRequest<'a, T> {
    pub fn new(method: &'a str, params: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<R> {
    pub result: Option<R>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Transaction encoding accepted by `sendBundle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleEncoding {
    Base58,
    Base64,
}

impl BundleEncoding {
    pub fn from_str(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "base58" => BundleEncoding::Base58,
            _ => BundleEncoding::Base64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BundleEncoding::Base58 => "base58",
            BundleEncoding::Base64 => "base64",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendBundleOptions {
    pub encoding: &'static str,
}

/// `getBundleStatuses` result
#[derive(Debug, Deserialize)]
pub struct BundleStatusesResult {
    #[serde(default)]
    pub value: Vec<Option<BundleStatusEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleStatusEntry {
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    /// `{"Ok": null}` on success
    #[serde(default)]
    pub err: Option<serde_json::Value>,
}

/// Where a submitted bundle stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleState {
    Landed { slot: Option<u64> },
    Failed(String),
    Pending,
}

impl BundleStatusEntry {
    pub fn state(&self) -> BundleState {
        if let Some(err) = &self.err {
            let ok = err.is_null() || err.get("Ok").map_or(false, |v| v.is_null());
            if !ok {
                return BundleState::Failed(err.to_string());
            }
        }

        match self.confirmation_status.as_deref() {
            Some("confirmed") | Some("finalized") => BundleState::Landed { slot: self.slot },
            _ => BundleState::Pending,
        }
    }
}

/// Result of handing a batch to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Landed { bundle_id: String },
    /// The relay refused the batch or reported it failed
    Rejected { reason: String },
    /// Attempts or polling budget ran out
    Exhausted { attempts: u32, last_error: String },
}

impl SubmitOutcome {
    pub fn is_landed(&self) -> bool {
        matches!(self, SubmitOutcome::Landed { .. })
    }
}
