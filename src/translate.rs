//! # 翻译回退
//!
//! 词典查不到释义时调用外部翻译服务。失败（网络、超时、格式）一律返回 None，
//! 不向调用方抛错。

use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;

pub trait Translator {
    /// 返回候选释义；失败或无结果时为 None
    fn translate(&self, text: &str, target_language: &str) -> Option<Vec<String>>;
}

/// 不做翻译
pub struct NoTranslator;

impl Translator for NoTranslator {
    fn translate(&self, _text: &str, _target_language: &str) -> Option<Vec<String>> {
        None
    }
}

const GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Google 翻译（无需 key 的 gtx 接口）
pub struct GoogleTranslator {
    agent: ureq::Agent,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(timeout: Duration) -> Self {
        Self::with_endpoint(GOOGLE_ENDPOINT, timeout)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, endpoint: endpoint.into() }
    }
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str, target_language: &str) -> Option<Vec<String>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let response = self
            .agent
            .get(&self.endpoint)
            .query("client", "gtx")
            .query("sl", "zh-CN")
            .query("tl", target_language)
            .query("dt", "t")
            .query("q", text)
            .call();
        let body: Value = match response {
            Ok(r) => match r.into_json() {
                Ok(v) => v,
                Err(e) => {
                    warn!("[Translate] bad response for {:?}: {}", text, e);
                    return None;
                }
            },
            Err(e) => {
                warn!("[Translate] request for {:?} failed: {}", text, e);
                return None;
            }
        };
        let result = parse_response(&body);
        debug!("[Translate] {:?} → {:?}", text, result);
        result
    }
}

/// 响应形如 `[[["beer","啤酒",...], ...], ...]`，拼接各段译文
fn parse_response(body: &Value) -> Option<Vec<String>> {
    let segments = body.get(0)?.as_array()?;
    let joined: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();
    let joined = joined.trim();
    if joined.is_empty() {
        None
    } else {
        Some(vec![joined.to_string()])
    }
}
