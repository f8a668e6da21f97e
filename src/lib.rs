//! NAV Hunter - regulatory filing monitor
//!
//! Ingests the live filing stream (or a replayed log, or a historical query),
//! enriches matching filings with their document text, scores them with an
//! LLM and pushes alerts, optionally spoken, to subscribed sessions.

pub mod api;
pub mod bus;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod events;
pub mod factory;
pub mod feed;
pub mod fetch;
pub mod llm;
pub mod services;

// Re-export commonly used types
pub use bus::EventBus;
pub use config::{AppConfig, SessionConfig};
pub use events::{Alert, AnalysisVerdict, FilingEvent, Notification};
pub use services::pipeline::{EventPipeline, PipelineOutcome};
pub use services::session::SessionRegistry;

#[cfg(test)]
pub(crate) mod test_support;
