//! Text generation backend and the prompt helpers built on it.
//!
//! The production backend talks to the ERNIE chat endpoint over HTTP;
//! the workflow only sees the [`TextGenerator`] trait so tests can swap
//! in a canned implementation.

use log::debug;
use serde::{Deserialize, Serialize};

/// Prompt for point-to-point requirement answers.
pub const PROMPT_ANSWER: &str = "现在有个问答，比选文件要求和比选申请人应答，我给你举个例子 ，比如比选文件要求：支持可视化创建不同类型数据源，包括但不限于：传统数据库、文件系统、消息队列、SaaS API，NoSQL等、必选申请人回答的是：完全支持。系统支持数据源配置化管理，数据源、数据目标的信息可界面化管理。支持新增、修改、删除等配置管理功能，支持搜索功能。你学习一下我的风格。现在我是比选申请人，请严格按照我的风格来回答，请注意我回答的格式：首先是'完全支持'，然后说'系统支持什么什么', 这个过程需要你按照问题回答，不要跑题。例如，输入我的整体回答就变成了：'完全支持。系统支持数据源配置化管理，数据源、数据目标的信息可界面化管理。支持新增、修改、删除等配置高级管理功能，全面支持搜索功能。'以下是输入文字：";

/// Prompt for generating fallback section content when no source
/// material document exists.
pub const PROMPT_CONTENT: &str = "你是一个大数据平台的专业产品售前，请针对这一需求给出800字的产品功能介绍，不要开头和总结，直接写产品功能，不需要用markdown格式，直接文本格式+特殊项目符号输出即可，需求如下:";

/// Prompt for condensing a requirement into a short section title.
pub const PROMPT_TITLE: &str = "你是一个专业作者，请把以下这段文字变为10字以内不带细节内容和标点和解释的文字，直接给出结果不要'简化为'这种返回：";

const TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
const CHAT_URL: &str =
    "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/ernie_speed";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(String),
    #[error("generation response was unusable: {0}")]
    Response(String),
    #[error("missing credentials: {0}")]
    Credentials(String),
}

/// One-shot prompt-in, text-out backend.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Condense a requirement into a section title. The model's trailing
/// punctuation is stripped; with `mark_keywords` set, a ★ or ▲ present
/// in the requirement is carried onto the title when the model dropped it.
pub fn shorten_title(
    generator: &dyn TextGenerator,
    requirement: &str,
    mark_keywords: bool,
) -> Result<String, GenerationError> {
    let raw = generator.generate(&format!("{PROMPT_TITLE}'{requirement}'"))?;
    let mut title = raw.replace('。', "");
    if mark_keywords {
        if requirement.contains('★') && !title.contains('★') {
            title = format!("★{title}");
        } else if requirement.contains('▲') && !title.contains('▲') {
            title = format!("▲{title}");
        }
    }
    debug!("requirement condensed to title: {title}");
    Ok(title)
}

/// Produce the point-to-point answer for one requirement.
pub fn answer_requirement(
    generator: &dyn TextGenerator,
    requirement: &str,
) -> Result<String, GenerationError> {
    generator.generate(&format!("{PROMPT_ANSWER}'{requirement}'"))
}

/// Produce fallback body content for a requirement that has no source
/// material document.
pub fn generate_solution(
    generator: &dyn TextGenerator,
    requirement: &str,
) -> Result<String, GenerationError> {
    generator.generate(&format!("'{PROMPT_CONTENT} {requirement}'"))
}

/// Credentials and endpoints for the ERNIE backend.
#[derive(Debug, Clone)]
pub struct ErnieConfig {
    pub api_key: String,
    pub secret_key: String,
    pub token_url: String,
    pub chat_url: String,
}

impl ErnieConfig {
    /// Read credentials from `ERNIE_API_KEY` / `ERNIE_SECRET_KEY`.
    pub fn from_env() -> Result<Self, GenerationError> {
        let api_key = std::env::var("ERNIE_API_KEY")
            .map_err(|_| GenerationError::Credentials("ERNIE_API_KEY is not set".into()))?;
        let secret_key = std::env::var("ERNIE_SECRET_KEY")
            .map_err(|_| GenerationError::Credentials("ERNIE_SECRET_KEY is not set".into()))?;
        Ok(ErnieConfig {
            api_key,
            secret_key,
            token_url: TOKEN_URL.to_string(),
            chat_url: CHAT_URL.to_string(),
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    result: Option<String>,
    error_msg: Option<String>,
}

/// Blocking HTTP backend against the ERNIE chat API. A fresh access
/// token is obtained per request.
pub struct ErnieGenerator {
    config: ErnieConfig,
    client: reqwest::blocking::Client,
}

impl ErnieGenerator {
    pub fn new(config: ErnieConfig) -> Self {
        ErnieGenerator { config, client: reqwest::blocking::Client::new() }
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Ok(Self::new(ErnieConfig::from_env()?))
    }

    fn access_token(&self) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.secret_key.as_str()),
            ])
            .send()
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        let token: TokenResponse =
            response.json().map_err(|e| GenerationError::Response(e.to_string()))?;
        token
            .access_token
            .ok_or_else(|| GenerationError::Credentials("token endpoint returned no access_token".into()))
    }
}

impl TextGenerator for ErnieGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let token = self.access_token()?;
        let url = format!("{}?access_token={token}", self.config.chat_url);
        let request = ChatRequest { messages: vec![ChatMessage { role: "user", content: prompt }] };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        let chat: ChatResponse =
            response.json().map_err(|e| GenerationError::Response(e.to_string()))?;
        match chat.result {
            Some(result) => Ok(result),
            None => Err(GenerationError::Response(
                chat.error_msg.unwrap_or_else(|| "empty result".into()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Canned {
        reply: String,
        prompts: RefCell<Vec<String>>,
    }

    impl Canned {
        fn new(reply: &str) -> Self {
            Canned { reply: reply.to_string(), prompts: RefCell::new(Vec::new()) }
        }
    }

    impl TextGenerator for Canned {
        fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn title_strips_full_stops() {
        let backend = Canned::new("数据源管理。");
        let title = shorten_title(&backend, "支持可视化创建数据源", false).unwrap();
        assert_eq!(title, "数据源管理");
    }

    #[test]
    fn star_marker_is_carried_onto_the_title() {
        let backend = Canned::new("数据源管理");
        let title = shorten_title(&backend, "★支持可视化创建数据源", true).unwrap();
        assert_eq!(title, "★数据源管理");
    }

    #[test]
    fn triangle_marker_is_not_duplicated() {
        let backend = Canned::new("▲数据源管理");
        let title = shorten_title(&backend, "▲支持可视化创建数据源", true).unwrap();
        assert_eq!(title, "▲数据源管理");
    }

    #[test]
    fn markers_are_ignored_when_flag_is_off() {
        let backend = Canned::new("数据源管理");
        let title = shorten_title(&backend, "★支持可视化创建数据源", false).unwrap();
        assert_eq!(title, "数据源管理");
    }

    #[test]
    fn helpers_compose_their_prompts() {
        let backend = Canned::new("ok");
        answer_requirement(&backend, "需求A").unwrap();
        generate_solution(&backend, "需求B").unwrap();
        let prompts = backend.prompts.borrow();
        assert!(prompts[0].starts_with(PROMPT_ANSWER));
        assert!(prompts[0].ends_with("'需求A'"));
        assert!(prompts[1].contains(PROMPT_CONTENT));
        assert!(prompts[1].ends_with("需求B'"));
    }
}
