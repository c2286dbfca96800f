//! Microsoft Graph mail endpoints.
//!
//! Every call is a single blocking round trip with the client-wide timeout.
//! Nothing here retries; callers decide what a failure means.

use std::time::Duration;

use log::info;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// The slice of the Graph API the agent talks to.
pub trait MailApi {
    /// Newest `top` message ids of a folder, as the raw listing envelope.
    fn list_folder(&self, access_token: &str, folder: &str, top: u32) -> Result<Value>;
    /// JSON representation of one message.
    fn get_message(&self, access_token: &str, id: &str) -> Result<Value>;
    /// MIME content of one message, byte for byte.
    fn get_raw_message(&self, access_token: &str, id: &str) -> Result<Vec<u8>>;
    /// Create a message and return what the server made of it.
    fn create_message(&self, access_token: &str, message: &Value) -> Result<Value>;
}

pub struct GraphClient {
    http: Client,
    base: Url,
    debug: bool,
}

impl GraphClient {
    pub fn new(api_base: &str, timeout: Duration, debug: bool) -> Result<Self> {
        let base = Url::parse(api_base)
            .map_err(|e| Error::Configuration(vec![format!("invalid api_base {api_base}: {e}")]))?;
        if base.cannot_be_a_base() {
            return Err(Error::Configuration(vec![format!(
                "api_base {api_base} cannot carry a path"
            )]));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base, debug })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = request.send()?;
        let status = response.status();
        let body = response.bytes()?.to_vec();
        log_response(status.as_u16(), &body, self.debug);

        if !status.is_success() {
            return Err(Error::Fetch {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }

    fn get(&self, url: Url, access_token: &str) -> Result<Vec<u8>> {
        self.execute(
            self.http
                .get(url)
                .bearer_auth(access_token)
                .header(reqwest::header::CONTENT_TYPE, "application/json"),
        )
    }
}

impl MailApi for GraphClient {
    fn list_folder(&self, access_token: &str, folder: &str, top: u32) -> Result<Value> {
        let mut url = self.endpoint(&["me", "mailFolders", folder, "messages"]);
        url.set_query(Some(&format!("$format=json&$top={top}&$select=id")));
        let body = self.get(url, access_token)?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn get_message(&self, access_token: &str, id: &str) -> Result<Value> {
        let body = self.get(self.endpoint(&["me", "messages", id]), access_token)?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn get_raw_message(&self, access_token: &str, id: &str) -> Result<Vec<u8>> {
        self.get(self.endpoint(&["me", "messages", id, "$value"]), access_token)
    }

    fn create_message(&self, access_token: &str, message: &Value) -> Result<Value> {
        let body = self.execute(
            self.http
                .post(self.endpoint(&["me", "messages"]))
                .bearer_auth(access_token)
                .json(message),
        )?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Status always, body only in debug mode.
pub(crate) fn log_response(status: u16, body: &[u8], debug: bool) {
    info!("request status : {status}");
    if debug {
        info!("body: {}", String::from_utf8_lossy(body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> GraphClient {
        GraphClient::new(base, Duration::from_secs(5), false).unwrap()
    }

    #[test]
    fn builds_paths_under_versioned_base() {
        let c = client("https://graph.microsoft.com/v1.0");
        assert_eq!(
            c.endpoint(&["me", "messages", "AAMk=", "$value"]).as_str(),
            "https://graph.microsoft.com/v1.0/me/messages/AAMk=/$value"
        );
    }

    #[test]
    fn builds_paths_under_bare_host() {
        let c = client("http://127.0.0.1:8080");
        assert_eq!(
            c.endpoint(&["me", "mailFolders", "inbox", "messages"]).as_str(),
            "http://127.0.0.1:8080/me/mailFolders/inbox/messages"
        );
    }

    #[test]
    fn folder_names_are_escaped() {
        let c = client("https://graph.microsoft.com/v1.0");
        assert_eq!(
            c.endpoint(&["me", "mailFolders", "a b/c", "messages"]).as_str(),
            "https://graph.microsoft.com/v1.0/me/mailFolders/a%20b%2Fc/messages"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(matches!(
            GraphClient::new("mailto:x@y", Duration::from_secs(1), false),
            Err(Error::Configuration(_))
        ));
    }
}
