use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub role: String,
    pub chatbot_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, FromRow)]
pub struct MessageWithChatbot {
    #[sqlx(flatten)]
    pub message: Message,
    pub chatbot_name: String,
}

/// Flattened view served by the messages listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListItem {
    pub id: Uuid,
    pub chatbot_id: Uuid,
    pub chatbot_name: String,
    pub content: String,
    pub role: String,
    pub response: String,
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<MessageWithChatbot> for MessageListItem {
    fn from(row: MessageWithChatbot) -> Self {
        let response = if row.message.role == "assistant" {
            row.message.content.clone()
        } else {
            String::new()
        };
        MessageListItem {
            id: row.message.id,
            chatbot_id: row.message.chatbot_id,
            chatbot_name: row.chatbot_name,
            content: row.message.content,
            role: row.message.role,
            response,
            status: "success",
            timestamp: row.message.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageQuery {
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> MessageWithChatbot {
        MessageWithChatbot {
            message: Message {
                id: Uuid::new_v4(),
                content: "hello".into(),
                role: role.into(),
                chatbot_id: Uuid::new_v4(),
                created_at: chrono::Utc::now(),
            },
            chatbot_name: "Bot".into(),
        }
    }

    #[test]
    fn assistant_messages_carry_response() {
        let item = MessageListItem::from(row("assistant"));
        assert_eq!(item.response, "hello");
        assert_eq!(item.status, "success");
    }

    #[test]
    fn user_messages_have_empty_response() {
        let item = MessageListItem::from(row("user"));
        assert!(item.response.is_empty());
        assert_eq!(item.content, "hello");
    }
}
