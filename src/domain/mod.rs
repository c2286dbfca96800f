pub mod action;
pub mod email;

pub use action::{Action, UnknownAction};
pub use email::{Message, MessageId, OutgoingMail};
