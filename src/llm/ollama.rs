use crate::llm::client::{LLMClient, TokenStream};
use crate::types::{AppError, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    Ollama,
};

const DEFAULT_PORT: u16 = 11434;

/// Chat client for a local or remote Ollama server
pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    /// Connect to `base_url` (`scheme://host:port`) using `model`
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let (host, port) = split_base_url(&base_url);
        let client = Ollama::new(host, port);

        Ok(Self { client, model })
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }
}

/// Split `scheme://host:port` into the host (with scheme) and port expected
/// by `Ollama::new`.
fn split_base_url(base_url: &str) -> (String, u16) {
    let (scheme, rest) = match base_url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", base_url),
    };
    let rest = rest.trim_end_matches('/');

    match rest.rsplit_once(':') {
        Some((host, port)) => (
            format!("{}://{}", scheme, host),
            port.parse().unwrap_or(DEFAULT_PORT),
        ),
        None => (format!("{}://{}", scheme, rest), DEFAULT_PORT),
    }
}

fn stream_failure(model: &str, received: usize) -> AppError {
    AppError::LLM(format!(
        "Ollama stream for model {} failed after {} chunks (connection dropped or malformed chunk)",
        model, received
    ))
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ])
        .await
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TokenStream> {
        let messages = vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ];
        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let mut stream_response = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama stream error: {}", e)))?;

        let model = self.model.clone();
        let output_stream = stream! {
            let mut received = 0usize;
            while let Some(chunk_result) = stream_response.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        received += 1;
                        let content = chunk.message.content;
                        if !content.is_empty() {
                            yield Ok(content);
                        }
                    }
                    // ollama-rs reports undecodable or failed chunks as `()`
                    Err(()) => {
                        yield Err(stream_failure(&model, received));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(output_stream))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
