use axum::extract::ws::Message;
use serde::Serialize;

use crate::msg::types::{InboundEnvelope, OutboundEnvelope};

#[derive(Debug)]
pub enum ProtocolError {
    NotText,
    DecodeError(serde_json::Error),
    EncodeError(serde_json::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotText => write!(f, "frame was not a text message"),
            Self::DecodeError(e) => write!(f, "decode: {e}"),
            Self::EncodeError(e) => write!(f, "encode: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a typed payload as the `{type, timestamp, data}` envelope and
/// return a ready-to-send text frame.
pub fn encode_message<T: Serialize>(
    type_str: &'static str,
    timestamp: i64,
    payload: T,
) -> Result<Message, ProtocolError> {
    let envelope = OutboundEnvelope {
        kind: type_str,
        timestamp,
        data: payload,
    };
    let text = serde_json::to_string(&envelope).map_err(ProtocolError::EncodeError)?;
    Ok(Message::Text(text))
}

/// Decode an inbound text frame into its envelope. The `data` field is left
/// as a `serde_json::Value`; callers deserialize it into the payload struct
/// matching `envelope.kind`.
pub fn decode_message(msg: &Message) -> Result<InboundEnvelope, ProtocolError> {
    let text = match msg {
        Message::Text(t) => t,
        _ => return Err(ProtocolError::NotText),
    };
    serde_json::from_str(text).map_err(ProtocolError::DecodeError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::types::PlayerRespawnPayload;

    #[test]
    fn encode_then_decode_round_trips_envelope_shape() {
        let msg = encode_message(
            "player:respawn",
            1234,
            PlayerRespawnPayload {
                player_id: "p1".into(),
                x: 10.0,
                y: 20.0,
                health: 100,
            },
        )
        .expect("encode should succeed");

        let envelope = decode_message(&msg).expect("decode should succeed");
        assert_eq!(envelope.kind, "player:respawn");
        assert_eq!(envelope.data["playerId"], "p1");
    }

    #[test]
    fn decode_rejects_non_text_frames() {
        let msg = Message::Binary(vec![1, 2, 3]);
        assert!(matches!(decode_message(&msg), Err(ProtocolError::NotText)));
    }
}
