use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::constants::replay::{HISTORICAL_LOOKBACK_DAYS, HISTORICAL_MAX_RESULTS};
use crate::events::{EventSource, LogLevel, Notification};
use crate::feed::{FilingQuery, FilingSearch};
use crate::services::pipeline::EventPipeline;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoricalReport {
    pub total_matches: u64,
    pub processed: usize,
    pub alerts: usize,
    pub failed: bool,
}

/// Pulls recent filings for one ticker and runs them through the pipeline.
pub struct HistoricalQueryEngine {
    query: Arc<dyn FilingQuery>,
    pipeline: EventPipeline,
    event_delay: Duration,
}

impl HistoricalQueryEngine {
    pub fn new(query: Arc<dyn FilingQuery>, pipeline: EventPipeline, event_delay: Duration) -> Self {
        Self {
            query,
            pipeline,
            event_delay,
        }
    }

    pub fn search_for(ticker: &str, form_types: &[String]) -> FilingSearch {
        FilingSearch {
            ticker: ticker.to_string(),
            form_types: form_types.to_vec(),
            filed_since: (Utc::now() - ChronoDuration::days(HISTORICAL_LOOKBACK_DAYS)).date_naive(),
            size: HISTORICAL_MAX_RESULTS,
        }
    }

    /// Always ends with `test_ticker_finished`, whatever the query did.
    pub async fn run(&self, ticker: &str, config: &SessionConfig, out: &EventBus) -> HistoricalReport {
        info!("--- Starting FULL test for [{}] ---", ticker);
        out.log(LogLevel::Warn, format!("--- Starting FULL test for [{}] ---", ticker));

        let report = self.run_query(ticker, config, out).await;

        out.log(LogLevel::Warn, format!("--- Test for [{}] Complete ---", ticker));
        out.publish(Notification::TestTickerFinished);
        report
    }

    async fn run_query(&self, ticker: &str, config: &SessionConfig, out: &EventBus) -> HistoricalReport {
        let mut report = HistoricalReport::default();
        let search = Self::search_for(ticker, &config.form_type_filters);

        let results = match self.query.search(&search).await {
            Ok(results) => results,
            Err(e) => {
                error!("Ticker test failed: {}", e);
                out.log(LogLevel::Error, format!("❌ Ticker Test failed: {}", e));
                report.failed = true;
                return report;
            }
        };

        report.total_matches = results.total.value;
        if results.filings.is_empty() {
            out.log(
                LogLevel::Info,
                format!("No relevant filings found for {} in the last 6 months.", ticker),
            );
            return report;
        }

        let filings: Vec<_> = results.filings.into_iter().take(search.size).collect();
        out.log(
            LogLevel::Info,
            format!(
                "Found {} filings for {}. Processing up to {} of them...",
                report.total_matches,
                ticker,
                filings.len()
            ),
        );

        for (i, filing) in filings.iter().enumerate() {
            out.log(
                LogLevel::Info,
                format!(
                    "--- Processing filing {} of {} ({} filed on {}) ---",
                    i + 1,
                    filings.len(),
                    filing.form_type,
                    filing.filed_date()
                ),
            );
            let outcome = self
                .pipeline
                .process(filing, config, EventSource::Historical, out)
                .await;
            report.processed += 1;
            if outcome.is_alert() {
                report.alerts += 1;
            }
            tokio::time::sleep(self.event_delay).await;
        }

        report
    }
}
