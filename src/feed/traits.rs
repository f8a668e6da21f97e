use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::FeedError;

/// Raw text frames from one open connection. The stream ending means the
/// remote side closed; an `Err` item means the connection failed.
pub type FrameStream = BoxStream<'static, Result<String, FeedError>>;

#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Open a fresh connection. Dropping the returned stream closes it.
    async fn connect(&self) -> Result<FrameStream, FeedError>;

    /// Endpoint description for logs (never includes the API key).
    fn describe(&self) -> String;
}
