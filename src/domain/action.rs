use std::fmt;
use std::str::FromStr;

/// What a trigger does, picked by the `type` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetNewEmails,
    SendEmail,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetNewEmails => "get_new_emails",
            Action::SendEmail => "send_email",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `type` value outside the known set. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("type has an invalid value ({0})")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "get_new_emails" => Ok(Action::GetNewEmails),
            "send_email" => Ok(Action::SendEmail),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}
