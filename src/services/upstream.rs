//! # 上游语言模型客户端
//!
//! 向上游补全 API 发起流式请求，把 SSE 响应解析为文本增量流。
//!
//! ## 错误映射
//! 流打开前的失败（非 2xx 状态、连接失败）直接映射到错误分类
//! （401 → 认证失败，402 → 配额耗尽，429 → 限流，其余 → 传输失败）；
//! 流进行中的失败作为流内 `Err` 项交给中继统一转换为终结事件。

use std::collections::VecDeque;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::models::error::{RelayError, RelayErrorKind};

/// 文本增量流：上游每个 SSE 事件中的增量文本，或流内错误
pub type DeltaStream = BoxStream<'static, Result<String, RelayError>>;

/// 上游客户端
///
/// 持有复用的 `reqwest::Client` 连接池；每次生成请求调用一次
/// [`UpstreamClient::stream_completion`]。
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// SSE 行解析的中间状态
struct SseState {
    /// 上游字节流
    inner: BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>,
    /// 未消费完的行缓冲
    buf: String,
    /// 已解析出、待交付的增量队列
    queue: VecDeque<String>,
    /// 上游已结束（正常或出错），不再轮询
    done: bool,
}

impl UpstreamClient {
    /// 创建上游客户端
    ///
    /// # 参数
    /// - `base_url` - 上游 API 基础地址
    /// - `api_key` - 上游 API 密钥
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// 发起流式补全请求，返回文本增量流
    ///
    /// # 参数
    /// - `prompt` - 用户提示词（UI 描述）
    /// - `model_id` - 目标模型标识
    ///
    /// # 错误
    /// 流打开前的失败按状态码映射错误分类返回
    pub async fn stream_completion(
        &self,
        prompt: &str,
        model_id: &str,
    ) -> Result<DeltaStream, RelayError> {
        let body = json!({
            "model": model_id,
            "max_tokens": 4096,
            "stream": true,
            "system": "You are a UI component generator. Reply with a single \
                       self-contained React component in a ```jsx code fence.",
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RelayError::new(
                    RelayErrorKind::UpstreamTransportFailure,
                    format!("上游连接失败: {}", e),
                )
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::from_upstream_status(status.as_u16(), text));
        }

        let state = SseState {
            inner: resp.bytes_stream().boxed(),
            buf: String::new(),
            queue: VecDeque::new(),
            done: false,
        };

        // unfold 把「字节块 → 完整行 → 增量文本」的解析状态机
        // 展开为增量流；上游错误作为流内最后一项交付
        let stream = futures_util::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(delta) = state.queue.pop_front() {
                    return Some((Ok(delta), state));
                }
                if state.done {
                    return None;
                }
                match state.inner.next().await {
                    Some(Ok(chunk)) => {
                        state.buf.push_str(&String::from_utf8_lossy(&chunk));
                        drain_lines(&mut state.buf, &mut state.queue);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((
                            Err(RelayError::new(
                                RelayErrorKind::UpstreamTransportFailure,
                                format!("上游流中断: {}", e),
                            )),
                            state,
                        ));
                    }
                    None => {
                        state.done = true;
                        return None;
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// 把缓冲中的完整行解析为增量文本，压入交付队列
///
/// 不完整的最后一行留在缓冲中等待下一个字节块。
fn drain_lines(buf: &mut String, queue: &mut VecDeque<String>) {
    while let Some(pos) = buf.find('\n') {
        let line: String = buf.drain(..=pos).collect();
        if let Some(delta) = parse_sse_line(line.trim_end()) {
            if !delta.is_empty() {
                queue.push_back(delta);
            }
        }
    }
}

/// 解析单条 SSE 数据行，提取增量文本
///
/// 识别 Anthropic 风格的 `content_block_delta` 事件；
/// 其余行（event 行、ping、message_start 等）静默忽略。
///
/// # 返回值
/// - `Some(text)` - 该行携带的增量文本
/// - `None` - 非增量行
fn parse_sse_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    if data == "[DONE]" {
        return None;
    }
    let value: Value = serde_json::from_str(data).ok()?;
    if value.get("type").and_then(|t| t.as_str()) == Some("content_block_delta") {
        return value
            .get("delta")
            .and_then(|d| d.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string());
    }
    None
}
