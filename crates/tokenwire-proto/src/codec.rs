use bytes::Bytes;
use prost::Message;

use crate::error::{ProtoError, Result};
use crate::message::{ClientMessage, ServerMessage};

/// Serialize a client message into one transport frame.
pub fn encode_client(message: &ClientMessage) -> Bytes {
    Bytes::from(message.encode_to_vec())
}

/// Parse a client message (server side and relay side).
pub fn decode_client(buf: &[u8]) -> Result<ClientMessage> {
    Ok(ClientMessage::decode(buf)?)
}

/// Serialize a server message into one transport frame.
pub fn encode_server(message: &ServerMessage) -> Bytes {
    Bytes::from(message.encode_to_vec())
}

/// Parse a server message.
///
/// A message that decodes but carries neither a handshake nor a result is
/// rejected with [`ProtoError::EmptyMessage`].
pub fn decode_server(buf: &[u8]) -> Result<ServerMessage> {
    let message = ServerMessage::decode(buf)?;
    if message.content.is_none() {
        return Err(ProtoError::EmptyMessage);
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{PayloadKind, PayloadResult, ResultMessage, ResultStatus};

    #[test]
    fn client_message_survives_encoding() {
        let mut message = ClientMessage {
            sequence_number: 7,
            filter_name: "faces".to_string(),
            payloads: vec![Bytes::from_static(b"jpeg-bytes"), Bytes::new()],
            extras: Some(prost_types::Any {
                type_url: "type.example/Style".to_string(),
                value: vec![1, 2, 3],
            }),
            ..ClientMessage::default()
        };
        message.set_payload_kind(PayloadKind::Audio);

        let decoded = decode_client(&encode_client(&message)).unwrap();

        assert_eq!(decoded, message);
        assert_eq!(decoded.payload_kind(), PayloadKind::Audio);
    }

    #[test]
    fn handshake_decodes_with_filters_in_order() {
        let wire = encode_server(&ServerMessage::handshake(["b", "a", "c"], 3));
        let decoded = decode_server(&wire).unwrap();

        let handshake = decoded.as_handshake().expect("handshake content");
        assert_eq!(handshake.filters, vec!["b", "a", "c"]);
        assert_eq!(handshake.credit_per_filter, 3);
        assert!(!decoded.return_credit);
    }

    #[test]
    fn result_decodes_with_status_and_credit_flag() {
        let result = ResultMessage::new("faces", ResultStatus::EngineError, 4);
        let wire = encode_server(&ServerMessage::result(result, true));
        let decoded = decode_server(&wire).unwrap();

        let result = decoded.as_result().expect("result content");
        assert_eq!(result.status(), ResultStatus::EngineError);
        assert_eq!(result.sequence_number, 4);
        assert!(decoded.return_credit);
    }

    #[test]
    fn result_payloads_are_preserved() {
        let mut result = ResultMessage::new("ocr", ResultStatus::Success, 0);
        result.results.push(PayloadResult::new(
            PayloadKind::Other,
            Bytes::from_static(b"hello"),
        ));
        let wire = encode_server(&ServerMessage::result(result, false));

        let decoded = decode_server(&wire).unwrap();
        let result = decoded.as_result().unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].payload_kind(), PayloadKind::Other);
        assert_eq!(result.results[0].payload.as_ref(), b"hello");
    }

    #[test]
    fn empty_server_message_rejected() {
        let wire = ServerMessage {
            content: None,
            return_credit: true,
        }
        .encode_to_vec();

        assert!(matches!(
            decode_server(&wire),
            Err(ProtoError::EmptyMessage)
        ));
    }

    #[test]
    fn garbage_rejected() {
        let result = decode_server(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(ProtoError::Decode(_))));
    }
}
