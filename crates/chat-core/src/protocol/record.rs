//! Pipe-delimited record format carried inside each frame.
//!
//! ```text
//! ip|userName|chunk
//! ```
//!
//! The record has exactly two delimiters.  The two header fields never
//! contain `|` (it is stripped when serializing); the chunk is the final
//! field, so decoding with `splitn(3, '|')` keeps any `|` the user typed.

use crate::protocol::messages::{
    truncate_chars, ChatMessage, MAX_IP_LEN, MAX_PARCEL_LEN, MAX_USERNAME_LEN, RECORD_DELIMITER,
};

/// Serializes the identity of `message` together with `chunk` into a record.
///
/// Each field is truncated to its capacity, so the result is at most
/// `15 + 1 + 5 + 1 + 40` characters.
pub fn serialize_record(message: &ChatMessage, chunk: &str) -> String {
    let ip = header_field(&message.origin_ip, MAX_IP_LEN);
    let user = header_field(&message.user_name, MAX_USERNAME_LEN);
    let chunk = truncate_chars(chunk, MAX_PARCEL_LEN);
    format!("{ip}{RECORD_DELIMITER}{user}{RECORD_DELIMITER}{chunk}")
}

/// Decodes a record into a fresh [`ChatMessage`] with an empty timestamp.
pub fn decode_record(payload: &str) -> ChatMessage {
    let mut message = ChatMessage::default();
    message.apply_record(payload);
    message
}

impl ChatMessage {
    /// Overwrites fields from a serialized record.
    ///
    /// Up to three tokens are read.  A missing or empty token leaves the
    /// corresponding field unchanged; a present token is copied and
    /// truncated to the field's capacity.  Malformed records never fail.
    pub fn apply_record(&mut self, payload: &str) {
        let mut tokens = payload.splitn(3, RECORD_DELIMITER);

        if let Some(ip) = tokens.next().filter(|t| !t.is_empty()) {
            self.origin_ip = truncate_chars(ip, MAX_IP_LEN);
        }
        if let Some(user) = tokens.next().filter(|t| !t.is_empty()) {
            self.user_name = truncate_chars(user, MAX_USERNAME_LEN);
        }
        if let Some(text) = tokens.next().filter(|t| !t.is_empty()) {
            self.text = truncate_chars(text, MAX_PARCEL_LEN);
        }
    }
}

fn header_field(value: &str, max: usize) -> String {
    let stripped: String = value.chars().filter(|&c| c != RECORD_DELIMITER).collect();
    truncate_chars(&stripped, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChatMessage {
        ChatMessage::new("192.168.0.12", "sam", "ignored")
    }

    #[test]
    fn test_serialize_record_layout() {
        let record = serialize_record(&sample(), "hello there");
        assert_eq!(record, "192.168.0.12|sam|hello there");
    }

    #[test]
    fn test_serialize_record_truncates_every_field() {
        // Arrange
        let message = ChatMessage {
            origin_ip: "1234567890123456789".to_string(),
            user_name: "bartholomew".to_string(),
            ..ChatMessage::default()
        };
        let chunk = "x".repeat(55);

        // Act
        let record = serialize_record(&message, &chunk);

        // Assert
        let parts: Vec<&str> = record.split('|').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), MAX_IP_LEN);
        assert_eq!(parts[1], "barth");
        assert_eq!(parts[2].len(), MAX_PARCEL_LEN);
    }

    #[test]
    fn test_serialize_record_strips_delimiter_from_header_fields() {
        let message = ChatMessage {
            origin_ip: "10.0.0.1".to_string(),
            user_name: "a|b".to_string(),
            ..ChatMessage::default()
        };
        assert_eq!(serialize_record(&message, "hi"), "10.0.0.1|ab|hi");
    }

    #[test]
    fn test_decode_record_keeps_delimiter_inside_chunk() {
        let decoded = decode_record("10.0.0.1|ann|a|b|c");
        assert_eq!(decoded.text, "a|b|c");
    }

    #[test]
    fn test_decode_round_trips_in_capacity_message() {
        // Arrange
        let original = ChatMessage::new("172.16.4.20", "kim", "see you at noon");

        // Act
        let decoded = decode_record(&serialize_record(&original, &original.text));

        // Assert – identity and text survive; timestamp/origin are not on the wire
        assert_eq!(decoded.origin_ip, original.origin_ip);
        assert_eq!(decoded.user_name, original.user_name);
        assert_eq!(decoded.text, original.text);
    }

    #[test]
    fn test_apply_record_missing_tokens_leave_fields_unchanged() {
        // Arrange
        let mut message = ChatMessage {
            origin_ip: "1.1.1.1".to_string(),
            user_name: "old".to_string(),
            text: "previous".to_string(),
            ..ChatMessage::default()
        };

        // Act – only the ip token is present
        message.apply_record("2.2.2.2");

        // Assert
        assert_eq!(message.origin_ip, "2.2.2.2");
        assert_eq!(message.user_name, "old");
        assert_eq!(message.text, "previous");
    }

    #[test]
    fn test_apply_record_empty_token_counts_as_missing() {
        let mut message = ChatMessage {
            user_name: "keep".to_string(),
            ..ChatMessage::default()
        };
        message.apply_record("3.3.3.3||text");
        assert_eq!(message.user_name, "keep");
        assert_eq!(message.text, "text");
    }

    #[test]
    fn test_decode_record_truncates_oversized_tokens() {
        let payload = format!("999.999.999.999.999|abcdefgh|{}", "y".repeat(70));
        let decoded = decode_record(&payload);
        assert_eq!(decoded.origin_ip, "999.999.999.999");
        assert_eq!(decoded.user_name, "abcde");
        assert_eq!(decoded.text.chars().count(), MAX_PARCEL_LEN);
    }

    #[test]
    fn test_decode_record_of_empty_payload_is_default() {
        assert_eq!(decode_record(""), ChatMessage::default());
    }
}
