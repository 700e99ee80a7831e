use async_trait::async_trait;
use compute::{clean_ai_response, parse_ai_response, ComputeError, ParsedTransaction};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::AiConfig;

/// Prompt sent ahead of the SMS text.
pub const DEFAULT_PROMPT: &str = r#"你是一个专业的银行短信解析助手。请从以下短信中提取交易信息，返回 JSON 格式：
{
  "type": "INCOME 或 EXPENSE",
  "amount": "金额（数字）",
  "merchant": "商户名称",
  "cardLastFour": "卡号尾号（如有）",
  "transactionTime": "交易时间（ISO 8601 格式）",
  "categoryHint": "分类提示（如：餐饮、交通）"
}

注意：
1. 金额必须是正数
2. 如果短信中提到"消费"、"支出"，type 为 EXPENSE
3. 如果短信中提到"存入"、"到账"，type 为 INCOME
4. 商户名称尽量完整提取
5. 如果无法提取某个字段，返回 null
6. 只返回 JSON，不要有其他文字

短信内容：
"#;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI response contained no message")]
    EmptyResponse,
    #[error("Could not read AI response: {0}")]
    Response(#[from] ComputeError),
    #[error("Invalid AI configuration: {0}")]
    Config(String),
}

/// Extracts transaction details from the text of an SMS.
///
/// `Ok(None)` means the parser answered but found nothing to extract.
#[async_trait]
pub trait TransactionParser: Send + Sync + std::fmt::Debug {
    async fn parse(
        &self,
        raw_content: &str,
        sender: &str,
    ) -> Result<Option<ParsedTransaction>, ParserError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Client for DeepSeek or any other OpenAI-compatible chat completion API.
#[derive(Debug, Clone)]
pub struct DeepSeekParser {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl DeepSeekParser {
    pub fn new(config: &AiConfig) -> Result<Self, ParserError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // a trailing slash keeps a path prefix such as `/v1` when joining
        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&base)
            .and_then(|base| base.join("chat/completions"))
            .map_err(|e| ParserError::Config(format!("base_url `{}`: {}", config.base_url, e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Parses with a caller supplied prompt instead of [`DEFAULT_PROMPT`].
    pub async fn parse_with_template(
        &self,
        raw_content: &str,
        template: &str,
    ) -> Result<Option<ParsedTransaction>, ParserError> {
        let prompt = format!("{template}\n\n短信内容：{raw_content}");
        self.complete(&prompt).await
    }

    async fn complete(&self, prompt: &str) -> Result<Option<ParsedTransaction>, ParserError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("AI service returned {}: {}", status, body);
            return Err(ParserError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ParserError::EmptyResponse)?;

        info!("AI parse result: {}", content);
        read_answer(&content)
    }
}

#[async_trait]
impl TransactionParser for DeepSeekParser {
    #[instrument(skip(self, raw_content))]
    async fn parse(
        &self,
        raw_content: &str,
        sender: &str,
    ) -> Result<Option<ParsedTransaction>, ParserError> {
        debug!("Parsing SMS from {}", sender);
        let prompt = format!("{DEFAULT_PROMPT}{raw_content}");
        self.complete(&prompt).await
    }
}

/// An empty answer or a bare `null` means nothing was found.
fn read_answer(content: &str) -> Result<Option<ParsedTransaction>, ParserError> {
    let cleaned = clean_ai_response(content);
    if cleaned.is_empty() || cleaned == "null" {
        return Ok(None);
    }
    Ok(Some(parse_ai_response(&cleaned)?))
}
