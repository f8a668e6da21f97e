use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateSpeechRequestArgs, SpeechModel,
        SpeechResponseFormat, Voice,
    },
    Client,
};
use async_trait::async_trait;
use tracing::info;

use crate::error::LlmError;

/// One chat-style scoring call.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt: String,
}

#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Returns the message content of the first choice.
    async fn complete(&self, request: &ScoringRequest) -> Result<String, LlmError>;
}

#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Returns compact (mp3) audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, LlmError>;
}

#[derive(Clone)]
pub struct LLMClient {
    pub client: Client<OpenAIConfig>,
}

impl LLMClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        let client = Client::with_config(config);
        Self { client }
    }
}

#[async_trait]
impl ScoringService for LLMClient {
    #[allow(deprecated)]
    async fn complete(&self, request: &ScoringRequest) -> Result<String, LlmError> {
        info!("🤖 Sending request to LLM (Model: {})...", request.model);

        let chat = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages([ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request.prompt.as_str())
                    .build()?,
            )])
            .max_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build()?;

        let response = self.client.chat().create(chat).await?;

        info!("🤖 LLM Response received.");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl SpeechService for LLMClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, LlmError> {
        let request = CreateSpeechRequestArgs::default()
            .model(SpeechModel::Tts1)
            .voice(Voice::Alloy)
            .input(text)
            .response_format(SpeechResponseFormat::Mp3)
            .build()?;

        let response = self.client.audio().speech(request).await?;
        Ok(response.bytes.to_vec())
    }
}
