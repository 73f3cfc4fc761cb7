use serde::{Deserialize, Deserializer, Serialize};

/// Domain model for one chat message, as stored in the `messages` table.
///
/// Rows arrive from two places (history fetch and the realtime feed) and
/// both decode into this one shape at the store boundary. `created_at` is
/// kept as the backend's ISO-8601 string: the format is fixed-width, so
/// lexical order is chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub room: String,
    pub username: String,
    pub user_id: String,
}

/// The backend assigns message ids; depending on the table definition they
/// come back as JSON strings or numbers. Both normalize to a string.
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::ChatMessage;

    #[test]
    fn decodes_row_with_string_id() {
        let row = serde_json::json!({
            "id": "af31",
            "content": "bonjour",
            "created_at": "2024-01-01T10:00:00Z",
            "room": "3",
            "username": "users",
            "user_id": "u-1",
        });
        let message: ChatMessage = serde_json::from_value(row).unwrap();
        assert_eq!(message.id, "af31");
        assert_eq!(message.room, "3");
    }

    #[test]
    fn decodes_row_with_numeric_id() {
        let row = serde_json::json!({
            "id": 42,
            "content": "bonjour",
            "created_at": "2024-01-01T10:00:00Z",
            "room": "3",
            "username": "users",
            "user_id": "u-1",
        });
        let message: ChatMessage = serde_json::from_value(row).unwrap();
        assert_eq!(message.id, "42");
    }

    #[test]
    fn rejects_row_missing_content() {
        let row = serde_json::json!({
            "id": "1",
            "created_at": "2024-01-01T10:00:00Z",
            "room": "3",
            "username": "users",
            "user_id": "u-1",
        });
        assert!(serde_json::from_value::<ChatMessage>(row).is_err());
    }
}
