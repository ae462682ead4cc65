//! Policy for wallet requests posted by embedded web pages
//!
//! Page content is untrusted. No message can trigger signing: every request
//! is either rejected outright or handed to the user for manual approval,
//! which this crate never automates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request kinds a dApp page may post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeMethod {
    Connect,
    Disconnect,
    SignMessage,
    SignTransaction,
    SignAllTransactions,
    SignAndSendTransaction,
}

impl BridgeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeMethod::Connect => "connect",
            BridgeMethod::Disconnect => "disconnect",
            BridgeMethod::SignMessage => "signMessage",
            BridgeMethod::SignTransaction => "signTransaction",
            BridgeMethod::SignAllTransactions => "signAllTransactions",
            BridgeMethod::SignAndSendTransaction => "signAndSendTransaction",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageMessage {
    method: BridgeMethod,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeVerdict {
    /// Malformed or unsupported; nothing is shown to the user
    Rejected { reason: String },
    /// Shown to the user; approval is manual only
    RequiresManualApproval {
        method: BridgeMethod,
        origin: Option<String>,
        summary: String,
    },
}

/// Classify a raw message posted by page content
pub fn review_page_message(raw: &str) -> BridgeVerdict {
    let message: PageMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed page message");
            return BridgeVerdict::Rejected {
                reason: "unrecognized wallet request".to_string(),
            };
        }
    };

    if message.method == BridgeMethod::Disconnect {
        return BridgeVerdict::Rejected {
            reason: "no page is connected".to_string(),
        };
    }

    let payloads = match &message.params {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    };
    let summary = format!(
        "{} request with {} payload(s)",
        message.method.as_str(),
        payloads
    );

    tracing::info!(
        method = message.method.as_str(),
        origin = ?message.origin,
        "Page wallet request needs manual approval"
    );
    BridgeVerdict::RequiresManualApproval {
        method: message.method,
        origin: message.origin,
        summary,
    }
}
