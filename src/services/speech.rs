use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bus::EventBus;
use crate::error::SpeechError;
use crate::events::{LogLevel, Notification};
use crate::llm::SpeechService;

/// Turns alert text into audio for one subscriber, off the pipeline's path.
#[derive(Clone)]
pub struct SpeechDispatcher {
    service: Arc<dyn SpeechService>,
}

impl SpeechDispatcher {
    pub fn new(service: Arc<dyn SpeechService>) -> Self {
        Self { service }
    }

    /// Detached: the pipeline never awaits the returned handle. The handle only
    /// exists so callers (and tests) can observe the outcome.
    pub fn dispatch(&self, text: String, out: EventBus) -> JoinHandle<Result<(), SpeechError>> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.synthesize_and_deliver(&text, &out).await })
    }

    pub async fn synthesize_and_deliver(&self, text: &str, out: &EventBus) -> Result<(), SpeechError> {
        out.ai_log(
            LogLevel::Info,
            format!("🎤 Generating speech for: \"{}\"", text),
            None,
        );

        let audio = match self.service.synthesize(text).await {
            Ok(audio) if audio.is_empty() => Err(SpeechError::EmptyAudio),
            Ok(audio) => Ok(audio),
            Err(e) => Err(SpeechError::from(e)),
        };

        match audio {
            Ok(audio) => {
                info!("🎤 Speech generated ({} bytes)", audio.len());
                out.ai_log(LogLevel::Info, "✓ Speech generated.", None);
                out.publish(Notification::PlayTtsAudio {
                    audio_b64: STANDARD.encode(&audio),
                });
                Ok(())
            }
            Err(e) => {
                error!("TTS failed: {}", e);
                out.ai_log(LogLevel::Error, format!("❌ TTS failed: {}", e), None);
                Err(e)
            }
        }
    }
}
