//! Wire format for moves exchanged with the UI and with the remote peer.
//!
//! One UTF-8 JSON object per message:
//! `{"action":"connect","from":[x,y],"to":[x,y]}`. Positions identify nodes;
//! the optional `from_node`/`to_node` indices take precedence when present.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{integer_position, node_at_position};
use crate::{MatchState, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveAction {
    Connect,
    Cancel,
    /// Sent when a turn times out without a move.
    Pass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    pub action: MoveAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_node: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_node: Option<NodeId>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    #[error("payload is not a move object: {0}")]
    Malformed(String),
    #[error("{action:?} move is missing its {field} endpoint")]
    MissingEndpoint {
        action: MoveAction,
        field: &'static str,
    },
}

impl MovePayload {
    pub fn pass() -> Self {
        Self {
            action: MoveAction::Pass,
            from: None,
            to: None,
            from_node: None,
            to_node: None,
        }
    }

    /// Payload describing an edge between two existing nodes.
    pub fn between(state: &MatchState, action: MoveAction, from: NodeId, to: NodeId) -> Self {
        Self {
            action,
            from: state.nodes.get(from.0).map(|n| integer_position(n.position)),
            to: state.nodes.get(to.0).map(|n| integer_position(n.position)),
            from_node: Some(from),
            to_node: Some(to),
        }
    }

    pub fn encode(&self) -> String {
        // A struct of options, enums and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::NotUtf8)?;
        let payload: MovePayload = serde_json::from_str(text.trim())
            .map_err(|err| ProtocolError::Malformed(err.to_string()))?;
        if payload.action != MoveAction::Pass {
            if payload.from.is_none() && payload.from_node.is_none() {
                return Err(ProtocolError::MissingEndpoint {
                    action: payload.action,
                    field: "from",
                });
            }
            if payload.to.is_none() && payload.to_node.is_none() {
                return Err(ProtocolError::MissingEndpoint {
                    action: payload.action,
                    field: "to",
                });
            }
        }
        Ok(payload)
    }
}

/// Resolves both endpoints to nodes. `None` if either is unmatched.
pub fn resolve_move(state: &MatchState, payload: &MovePayload) -> Option<(NodeId, NodeId)> {
    let from = resolve_endpoint(state, payload.from_node, payload.from)?;
    let to = resolve_endpoint(state, payload.to_node, payload.to)?;
    Some((from, to))
}

fn resolve_endpoint(
    state: &MatchState,
    index: Option<NodeId>,
    position: Option<[i32; 2]>,
) -> Option<NodeId> {
    match (index, position) {
        (Some(id), _) => state.nodes.get(id.0).map(|n| n.id),
        (None, Some(at)) => node_at_position(state, at),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, duel_state, GREEN_NODE, RED_NODE};

    #[test]
    fn decodes_position_only_connect() {
        let payload =
            MovePayload::decode(br#"{"action":"connect","from":[150,300],"to":[800,300]}"#)
                .unwrap();
        assert_eq!(payload.action, MoveAction::Connect);
        assert_eq!(payload.from, Some([150, 300]));
        assert_eq!(payload.from_node, None);
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        assert!(MovePayload::decode(b"{\"action\":\"pass\"}\n").is_ok());
    }

    #[test]
    fn rejects_garbage_and_missing_endpoints() {
        assert!(matches!(
            MovePayload::decode(b"HELLO_FROM_CLIENT"),
            Err(ProtocolError::Malformed(_))
        ));
        assert_eq!(MovePayload::decode(&[0xff, 0xfe]), Err(ProtocolError::NotUtf8));
        assert!(matches!(
            MovePayload::decode(br#"{"action":"connect","from":[1,2]}"#),
            Err(ProtocolError::MissingEndpoint { field: "to", .. })
        ));
        assert!(matches!(
            MovePayload::decode(br#"{"action":"teleport"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn resolves_by_position_and_by_index() {
        let content = base_content();
        let state = duel_state(&content);
        let by_position = MovePayload {
            action: MoveAction::Connect,
            from: Some([150, 300]),
            to: Some([800, 300]),
            from_node: None,
            to_node: None,
        };
        assert_eq!(resolve_move(&state, &by_position), Some((GREEN_NODE, RED_NODE)));

        let by_index = MovePayload::between(&state, MoveAction::Connect, RED_NODE, GREEN_NODE);
        assert_eq!(resolve_move(&state, &by_index), Some((RED_NODE, GREEN_NODE)));

        let unmatched = MovePayload {
            from: Some([1, 1]),
            ..by_position
        };
        assert_eq!(resolve_move(&state, &unmatched), None);
    }

    #[test]
    fn encoded_payload_uses_wire_shape() {
        let content = base_content();
        let state = duel_state(&content);
        let json = MovePayload::between(&state, MoveAction::Connect, GREEN_NODE, RED_NODE).encode();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["action"], "connect");
        assert_eq!(value["from"], serde_json::json!([150, 300]));
        assert_eq!(value["to"], serde_json::json!([800, 300]));
        assert_eq!(MovePayload::pass().encode(), r#"{"action":"pass"}"#);
    }
}
