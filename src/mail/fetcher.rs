use log::info;

use crate::domain::{Message, MessageId};
use crate::error::Result;
use crate::mail::graph_client::MailApi;

/// Fetches full messages in whichever shape the run was configured for.
pub struct MessageFetcher<'a> {
    api: &'a dyn MailApi,
    raw_email: bool,
}

impl<'a> MessageFetcher<'a> {
    pub fn new(api: &'a dyn MailApi, raw_email: bool) -> Self {
        Self { api, raw_email }
    }

    /// Raw payloads are logged in full, whatever the debug setting.
    pub fn fetch(&self, access_token: &str, id: &MessageId) -> Result<Message> {
        if !self.raw_email {
            return Ok(Message::Structured(self.api.get_message(access_token, id)?));
        }

        let bytes = self.api.get_raw_message(access_token, id)?;
        let message = Message::raw(id.clone(), &bytes);
        if let Message::Raw { raw_mail, .. } = &message {
            info!("raw_mail {id} ({} bytes)", bytes.len());
            info!("{raw_mail}");
        }
        Ok(message)
    }
}
