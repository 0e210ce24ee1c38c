//! Relay message protocol between an event source and the store.
//!
//! Requests are JSON objects tagged by `type` (`ROUTE_CHANGE`, `GET_GRAPH`,
//! `CLEAR_GRAPH`, `GET_SETTINGS`, `SAVE_SETTINGS`, `GET_TREE`). Every request
//! gets exactly one [`RelayResponse`]; failures are reported in the response
//! instead of tearing down the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitetrail_shared::{Forest, Graph, IngestEvent, NavSettings};
use tracing::{debug, warn};

use crate::store::{GraphBackend, NavGraphStore};

/// Message types this relay understands.
const KNOWN_TYPES: &[&str] = &[
    "ROUTE_CHANGE",
    "GET_GRAPH",
    "CLEAR_GRAPH",
    "GET_SETTINGS",
    "SAVE_SETTINGS",
    "GET_TREE",
];

/// A request delivered over the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayRequest {
    RouteChange {
        #[serde(default)]
        payload: IngestEvent,
    },
    GetGraph,
    ClearGraph,
    GetSettings,
    SaveSettings {
        settings: NavSettings,
    },
    GetTree,
}

/// Outcome status carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Ok,
    Error,
    UnknownMessageType,
}

/// Response to one relay request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub status: RelayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Graph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<NavSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<Forest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    pub fn ok() -> Self {
        Self::with_status(RelayStatus::Ok)
    }

    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Self::with_status(RelayStatus::Error)
        }
    }

    pub fn unknown() -> Self {
        Self::with_status(RelayStatus::UnknownMessageType)
    }

    fn with_status(status: RelayStatus) -> Self {
        Self {
            status,
            graph: None,
            settings: None,
            tree: None,
            error: None,
        }
    }
}

/// Parse one JSON request line.
///
/// Returns `Err(response)` with the response to send when the line is not
/// a request this relay can execute.
pub fn parse_request(line: &str) -> Result<RelayRequest, RelayResponse> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| RelayResponse::error(format!("invalid JSON: {e}")))?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_owned();
    if !KNOWN_TYPES.contains(&kind.as_str()) {
        debug!(kind = %kind, "unknown relay message type");
        return Err(RelayResponse::unknown());
    }

    serde_json::from_value(value)
        .map_err(|e| RelayResponse::error(format!("malformed {kind} message: {e}")))
}

/// Execute `request` against `store`.
pub async fn dispatch<B: GraphBackend>(
    store: &mut NavGraphStore<B>,
    request: RelayRequest,
    now: DateTime<Utc>,
) -> RelayResponse {
    let result = match request {
        RelayRequest::RouteChange { payload } => {
            store.ingest(&payload, now).await.map(|_| RelayResponse::ok())
        }
        RelayRequest::GetGraph => store.read().await.map(|graph| RelayResponse {
            graph: Some(graph),
            ..RelayResponse::ok()
        }),
        RelayRequest::ClearGraph => store.reset().await.map(|_| RelayResponse::ok()),
        RelayRequest::GetSettings => store.settings().await.map(|settings| RelayResponse {
            settings: Some(settings),
            ..RelayResponse::ok()
        }),
        RelayRequest::SaveSettings { settings } => {
            store
                .update_settings(settings)
                .await
                .map(|settings| RelayResponse {
                    settings: Some(settings),
                    ..RelayResponse::ok()
                })
        }
        RelayRequest::GetTree => Ok(RelayResponse {
            tree: Some(store.tree()),
            ..RelayResponse::ok()
        }),
    };

    result.unwrap_or_else(|e| {
        warn!(error = %e, "relay request failed");
        RelayResponse::error(e)
    })
}

/// Parse and execute one JSON request line.
pub async fn handle_line<B: GraphBackend>(
    store: &mut NavGraphStore<B>,
    line: &str,
    now: DateTime<Utc>,
) -> RelayResponse {
    match parse_request(line) {
        Ok(request) => dispatch(store, request, now).await,
        Err(response) => response,
    }
}
