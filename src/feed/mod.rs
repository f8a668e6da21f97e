pub mod query;
pub mod traits;
pub mod ws;

pub use query::{FilingQuery, FilingSearch, QueryApiClient, SearchResults};
pub use traits::{FeedTransport, FrameStream};
pub use ws::WsFeedTransport;
