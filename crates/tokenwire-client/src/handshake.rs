use std::collections::HashSet;

use tokenwire_proto::ServerMessage;
use tracing::info;

use crate::error::{ClientError, Result};
use crate::registry::TokenRegistry;

/// What a handshake declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSummary {
    /// Filters the server consumes, deduplicated, in server order.
    pub filters: Vec<String>,
    /// Credit every filter starts with.
    pub credit_per_filter: u32,
    /// Whether this was the session's first handshake.
    pub first: bool,
}

/// Apply a handshake message to the registry.
///
/// Any handshake (first or later) replaces every bucket. A handshake that
/// also claims to return credit is a protocol violation.
pub fn apply(registry: &TokenRegistry, message: &ServerMessage) -> Result<HandshakeSummary> {
    let handshake = message.as_handshake().ok_or_else(|| {
        ClientError::ProtocolViolation("expected a handshake message".to_string())
    })?;

    if message.return_credit {
        return Err(ClientError::ProtocolViolation(
            "handshake must not return credit".to_string(),
        ));
    }

    let filters = dedupe_filters(&handshake.filters);
    let first = registry.reset(filters.iter().cloned(), handshake.credit_per_filter);

    info!(
        filters = ?filters,
        credit_per_filter = handshake.credit_per_filter,
        first,
        "handshake applied"
    );

    Ok(HandshakeSummary {
        filters,
        credit_per_filter: handshake.credit_per_filter,
        first,
    })
}

/// Filter names are opaque; only repeats are dropped, first occurrence wins.
fn dedupe_filters(filters: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(filters.len());
    filters
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}
