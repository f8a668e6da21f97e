use async_trait::async_trait;
use futures_util::{stream, SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info};

use crate::error::FeedError;

use super::traits::{FeedTransport, FrameStream};

/// Live filing stream, authenticated by an API key in the connection URL.
#[derive(Clone)]
pub struct WsFeedTransport {
    base_url: String,
    api_key: String,
}

impl WsFeedTransport {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}?apiKey={}", self.base_url, self.api_key)
    }
}

#[async_trait]
impl FeedTransport for WsFeedTransport {
    async fn connect(&self) -> Result<FrameStream, FeedError> {
        info!("Connecting to filing stream: {}", self.base_url);

        let (ws_stream, _) = connect_async(self.url())
            .await
            .map_err(|e| FeedError::Connection(e.to_string()))?;

        let frames = stream::unfold(ws_stream, |mut ws| async move {
            loop {
                match ws.next().await? {
                    Ok(Message::Text(text)) => return Some((Ok(text), ws)),
                    Ok(Message::Ping(payload)) => {
                        if let Err(e) = ws.send(Message::Pong(payload)).await {
                            return Some((Err(FeedError::WebSocket(e.to_string())), ws));
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("Filing stream close frame: {:?}", frame);
                        return None;
                    }
                    Ok(_) => continue,
                    Err(e) => return Some((Err(FeedError::WebSocket(e.to_string())), ws)),
                }
            }
        });

        Ok(frames.boxed())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
