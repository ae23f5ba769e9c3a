use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Plain-text message as sent to a completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

/// Request body accepted by `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<UiMessage>,
}

/// A message as the chat UI stores it.
#[derive(Debug, Clone, Deserialize)]
pub struct UiMessage {
    pub role: Role,
    #[serde(default, alias = "content")]
    pub message: Option<UiContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UiContent {
    Plain(String),
    /// `{ "type": "text", "text": ... }`; other `type`s carry no text.
    Part(UiPart),
    Parts(Vec<UiPart>),
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl UiPart {
    fn text(&self) -> Option<&str> {
        match (self.kind.as_str(), &self.text) {
            ("text", Some(t)) => Some(t),
            _ => None,
        }
    }
}

impl UiContent {
    /// Resolve to plain text; anything without a text reading is empty.
    pub fn to_text(&self) -> String {
        match self {
            UiContent::Plain(s) => s.clone(),
            UiContent::Part(p) => p.text().unwrap_or_default().to_string(),
            UiContent::Parts(parts) => parts.iter().filter_map(UiPart::text).collect(),
            UiContent::Other(_) => String::new(),
        }
    }
}

/// Project UI messages to provider messages, oldest first.
pub fn project(messages: &[UiMessage]) -> Vec<ConversationMessage> {
    messages
        .iter()
        .map(|m| ConversationMessage {
            role: m.role,
            content: m.message.as_ref().map(UiContent::to_text).unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ChatBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn projects_plain_and_structured_text() {
        let b = body(
            r#"{
                "threadId": "t-1",
                "messages": [
                    {"role": "user", "message": "show me sales"},
                    {"role": "assistant", "message": {"type": "text", "text": "Here you go"}},
                    {"role": "user", "content": "as a bar chart"}
                ]
            }"#,
        );
        assert_eq!(b.thread_id.as_deref(), Some("t-1"));

        let out = project(&b.messages);
        assert_eq!(
            out,
            vec![
                ConversationMessage { role: Role::User, content: "show me sales".into() },
                ConversationMessage { role: Role::Assistant, content: "Here you go".into() },
                ConversationMessage { role: Role::User, content: "as a bar chart".into() },
            ]
        );
    }

    #[test]
    fn unresolvable_content_projects_to_empty() {
        let b = body(
            r#"{"messages": [
                {"role": "assistant", "message": {"type": "template", "name": "chart", "templateProps": {}}},
                {"role": "assistant", "message": 42},
                {"role": "assistant"}
            ]}"#,
        );
        let out = project(&b.messages);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|m| m.content.is_empty()));
    }

    #[test]
    fn part_lists_keep_text_in_order() {
        let b = body(
            r#"{"messages": [{"role": "assistant", "message": [
                {"type": "text", "text": "one "},
                {"type": "template", "name": "dashboard"},
                {"type": "text", "text": "two"}
            ]}]}"#,
        );
        assert_eq!(project(&b.messages)[0].content, "one two");
    }

    #[test]
    fn projection_is_repeatable() {
        let b = body(
            r#"{"messages": [
                {"role": "user", "message": "hi"},
                {"role": "assistant", "message": {"type": "text", "text": "hello"}}
            ]}"#,
        );
        assert_eq!(project(&b.messages), project(&b.messages));
    }

    #[test]
    fn empty_history_is_forwarded() {
        let b = body(r#"{"messages": []}"#);
        assert!(project(&b.messages).is_empty());
        let b = body("{}");
        assert!(project(&b.messages).is_empty());
    }

    #[test]
    fn only_user_and_assistant_roles() {
        for role in ["system", "tool", "User", ""] {
            let json = format!(r#"{{"messages": [{{"role": "{role}", "message": "hi"}}]}}"#);
            assert!(serde_json::from_str::<ChatBody>(&json).is_err(), "{role:?} accepted");
        }
    }
}
