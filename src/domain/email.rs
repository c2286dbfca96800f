use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub type MessageId = String;

/// A fetched message, shaped by the `raw_email` option.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The Graph JSON representation, passed through untouched.
    Structured(Value),
    /// Base64 of the exact MIME bytes served by `/$value`.
    Raw { id: MessageId, raw_mail: String },
}

impl Message {
    pub fn raw(id: impl Into<MessageId>, bytes: &[u8]) -> Self {
        Message::Raw {
            id: id.into(),
            raw_mail: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Event payload for this message.
    pub fn into_payload(self) -> Value {
        match self {
            Message::Structured(v) => v,
            Message::Raw { id, raw_mail } => json!({ "id": id, "raw_mail": raw_mail }),
        }
    }
}

/// Body of `POST /me/messages`, built from the `[send_email]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub subject: String,
    pub importance: String,
    pub content_type: String,
    pub content: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
}

impl OutgoingMail {
    pub fn to_graph_json(&self) -> Value {
        let mut body = json!({
            "subject": self.subject,
            "importance": self.importance,
            "body": {
                "contentType": self.content_type,
                "content": self.content,
            },
            "toRecipients": recipients(&self.to),
        });
        if !self.cc.is_empty() {
            body["ccRecipients"] = recipients(&self.cc);
        }
        body
    }
}

fn recipients(addresses: &[String]) -> Value {
    Value::Array(
        addresses
            .iter()
            .map(|a| json!({ "emailAddress": { "address": a } }))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_payload_decodes_to_original_bytes() {
        let bytes = b"From: a@b\r\nSubject: hi\r\n\r\n\x00\xffbody";
        let payload = Message::raw("AAMk", bytes).into_payload();
        assert_eq!(payload["id"], "AAMk");
        let decoded = general_purpose::STANDARD
            .decode(payload["raw_mail"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn outgoing_mail_matches_graph_shape() {
        let mail = OutgoingMail {
            subject: "Report".into(),
            importance: "Low".into(),
            content_type: "HTML".into(),
            content: "<b>done</b>".into(),
            to: vec!["adele@contoso.com".into()],
            cc: vec![],
        };
        let body = mail.to_graph_json();
        assert_eq!(body["body"]["contentType"], "HTML");
        assert_eq!(
            body["toRecipients"][0]["emailAddress"]["address"],
            "adele@contoso.com"
        );
        assert!(body.get("ccRecipients").is_none());
    }
}
