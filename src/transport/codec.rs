//! JSON payload codec

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::TransportResult;

/// Encode a message for the wire
pub fn encode<T: Serialize>(message: &T) -> TransportResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Decode a message from the wire
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> TransportResult<T> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let result: TransportResult<u64> = decode(b"not json");
        assert!(matches!(result, Err(TransportError::Codec(_))));
    }
}
