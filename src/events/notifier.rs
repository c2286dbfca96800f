use base64::{Engine as _, engine::general_purpose};
use log::warn;
use notify_rust::{Hint, Notification};
use serde_json::Value;

use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::mail::decoders::{MailSummary, summarize_raw, summarize_structured};

/// Shows one desktop notification per event.
pub struct DesktopNotifier {
    app_name: String,
    icon: String,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            app_name: "outlook_agent".to_string(),
            icon: "mail-unread".to_string(),
        }
    }

    fn summarize(payload: &Value) -> MailSummary {
        if let Some(raw) = payload.get("raw_mail").and_then(Value::as_str)
            && let Ok(bytes) = general_purpose::STANDARD.decode(raw)
        {
            return summarize_raw(&bytes);
        }
        summarize_structured(payload)
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for DesktopNotifier {
    fn publish(&mut self, event: &Event) -> Result<()> {
        let summary = Self::summarize(&event.payload);

        let mut n = Notification::new();
        n.appname(&self.app_name)
            .summary(&format!("{}: {}", summary.from, summary.subject))
            .body(&summary.snippet)
            .icon(&self.icon)
            .hint(Hint::Category("email.arrived".to_string()));

        // A missing notification daemon should not fail the trigger.
        if let Err(e) = n.show() {
            warn!("Notification error: {e}");
        }
        Ok(())
    }
}
