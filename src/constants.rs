//! Application-wide constants and magic numbers
//!
//! Timings here are defaults; the `timings` block of `config.yaml` overrides
//! them at runtime.

use std::time::Duration;

/// Upstream feed constants
pub mod stream {
    use super::*;

    /// Delay before a dropped stream is reopened
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

    /// How long `stop` waits for the read loop to wind down
    pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

    pub const DEFAULT_STREAM_URL: &str = "wss://stream.sec-api.io";

    pub const DEFAULT_FRAME_LOG: &str = "websocket_stream.log";
}

/// Document fetching constants
pub mod fetch {
    use super::*;

    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

    /// EDGAR rejects requests without a contact-style user agent
    pub const USER_AGENT: &str = "NAVHunter myemail@example.com";

    /// Marker placed between filing text and press release text
    pub const PRESS_RELEASE_SEPARATOR: &str = "\n\n--- PRESS RELEASE CONTENT ---\n\n";
}

/// Analysis constants
pub mod analysis {
    /// Combined text at or below this many characters is not analyzed
    pub const MIN_CONTENT_CHARS: usize = 50;

    /// Only the head of the filing is sent to the scoring service
    pub const MAX_CONTENT_CHARS: usize = 12_000;

    pub const MAX_OUTPUT_TOKENS: u32 = 500;

    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

    pub const DEFAULT_TEMPERATURE: f32 = 0.2;

    pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 70;

    pub const DEFAULT_PROMPT: &str = r#"You are a financial analyst screening SEC filings for {company} ({ticker}), form {formType}.
Decide whether this filing contains market-moving news worth an immediate alert.
Respond ONLY with a JSON object:
{"isAlertWorthy": true|false, "confidenceScore": 0-100, "alertHighlight": true|false, "textToSpeak": "one short sentence", "summary": "two sentences"}"#;
}

/// Speech synthesis constants
pub mod speech {
    pub const FALLBACK_TEXT: &str = "Important alert detected, but no summary was provided.";
}

/// Replay and historical query constants
pub mod replay {
    use super::*;

    pub const STARTUP_DELAY: Duration = Duration::from_secs(1);

    pub const EVENT_DELAY: Duration = Duration::from_millis(500);

    pub const HISTORICAL_EVENT_DELAY: Duration = Duration::from_secs(1);

    pub const HISTORICAL_MAX_RESULTS: usize = 25;

    pub const HISTORICAL_LOOKBACK_DAYS: i64 = 180;

    pub const DEFAULT_QUERY_URL: &str = "https://api.sec-api.io";
}

/// Session defaults
pub mod session {
    pub const DEFAULT_FORM_TYPES: [&str; 3] = ["8-K", "10-Q", "10-K"];

    /// Per-session notification buffer
    pub const OUTPUT_CAPACITY: usize = 1024;
}
