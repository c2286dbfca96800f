pub mod decoders;
pub mod fetcher;
pub mod graph_client;
pub mod snapshot;

pub use fetcher::MessageFetcher;
pub use graph_client::{GraphClient, MailApi};
pub use snapshot::{PollOutcome, Snapshot, envelopes_equal, poll_folder};
