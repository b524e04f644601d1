//! Length-prefixed message framing.
//!
//! Messages are framed with a 4-byte big-endian length prefix followed by
//! the JSON payload:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```

use serde::{Serialize, de::DeserializeOwned};

use crate::DEFAULT_MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Validates a frame length against `max`.
pub fn check_frame_len(len: usize, max: u32) -> ProtocolResult<()> {
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    if len > max as usize {
        return Err(ProtocolError::MessageTooLarge { size: len, max });
    }
    Ok(())
}

/// Encodes a message with the default size limit.
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    encode_message_with_limit(message, DEFAULT_MAX_MESSAGE_SIZE)
}

/// Encodes a message to a complete frame, rejecting payloads above `max`.
pub fn encode_message_with_limit<T: Serialize>(message: &T, max: u32) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    check_frame_len(json.len(), max)?;
    let len = u32::try_from(json.len()).map_err(|_| ProtocolError::MessageTooLarge {
        size: json.len(),
        max,
    })?;

    let mut buffer = Vec::with_capacity(4 + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes a message with the default size limit.
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    decode_message_with_limit(data, DEFAULT_MAX_MESSAGE_SIZE)
}

/// Decodes one complete frame (length prefix + payload).
pub fn decode_message_with_limit<T: DeserializeOwned>(data: &[u8], max: u32) -> ProtocolResult<T> {
    let Some((header, rest)) = data.split_first_chunk::<4>() else {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4,
            received: data.len(),
        });
    };

    let len = u32::from_be_bytes(*header) as usize;
    check_frame_len(len, max)?;

    if rest.len() < len {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4 + len,
            received: data.len(),
        });
    }

    Ok(serde_json::from_slice(&rest[..len])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, StreamingMessage};

    #[test]
    fn encode_decode_roundtrip() {
        let envelope = Envelope::new("req-123", StreamingMessage::start_stream("w"));
        let bytes = encode_message(&envelope).unwrap();

        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len() - 4);

        let decoded: Envelope<StreamingMessage> = decode_message(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn decode_incomplete_length() {
        let result: ProtocolResult<Envelope<StreamingMessage>> = decode_message(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[0u8; 10]);

        let result: ProtocolResult<Envelope<StreamingMessage>> = decode_message(&data);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 104, received: 14 })
        ));
    }

    #[test]
    fn limit_applies_both_ways() {
        let envelope = Envelope::new("req-1", StreamingMessage::start_stream("worker"));
        let bytes = encode_message(&envelope).unwrap();

        let result = encode_message_with_limit(&envelope, 8);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { max: 8, .. })));

        let result: ProtocolResult<Envelope<StreamingMessage>> =
            decode_message_with_limit(&bytes, 8);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn empty_frame() {
        let result: ProtocolResult<Envelope<StreamingMessage>> = decode_message(&[0, 0, 0, 0]);
        assert!(matches!(result, Err(ProtocolError::EmptyMessage)));
    }

    #[test]
    fn garbage_payload() {
        let mut data = 3u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"{{{");
        let result: ProtocolResult<Envelope<StreamingMessage>> = decode_message(&data);
        assert!(matches!(result, Err(ProtocolError::Serialization(_))));
    }
}
