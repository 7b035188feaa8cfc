//! # 错误分类体系
//!
//! 定义贯穿流式协议的错误分类（taxonomy）。
//!
//! ## 传播策略
//! - 流打开**之前**产生的错误（请求校验失败等）走普通 JSON 错误响应
//! - 流打开**之后**产生的错误一律转换为恰好一个终结 `error` 事件，
//!   绝不允许让中继循环崩溃或让流无限期挂起
//! - 沙箱侧失败（编译超时、挂载异常等）完全封闭在生成的文档内部，
//!   对 HTTP 层永远表现为成功响应

use serde::{Deserialize, Serialize};

use crate::models::event::DeliveryEvent;

/// 中继错误分类
///
/// 每个变体对应一类失败来源，携带固定的 HTTP 等价状态码和
/// 面向用户的处置建议。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RelayErrorKind {
    /// 请求不合法：空提示词、超长提示词、未知模型标识
    InvalidRequest,
    /// 授权拒绝：模型不在调用方档位允许范围内
    AuthorizationDenied,
    /// 上游配额耗尽（402）
    UpstreamQuotaExhausted,
    /// 上游认证失败（401）
    UpstreamAuthInvalid,
    /// 上游限流（429）
    UpstreamRateLimited,
    /// 上游传输失败：网络错误、超时、意外状态码
    UpstreamTransportFailure,
}

/// 一个已分类的中继错误
///
/// `details` 保留上游原始错误文本（或处置建议），`kind` 决定
/// 状态码和用户可读消息。
#[derive(Debug, Clone, PartialEq)]
pub struct RelayError {
    /// 错误分类
    pub kind: RelayErrorKind,
    /// 补充细节：上游原始错误文本或操作建议
    pub details: String,
}

impl RelayError {
    /// 构造指定分类的错误
    pub fn new(kind: RelayErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }

    /// 根据上游 HTTP 状态码映射错误分类
    ///
    /// 401 → 认证失败，402 → 配额耗尽，429 → 限流，
    /// 其余一律归入传输失败。
    ///
    /// # 参数
    /// - `status` - 上游响应状态码
    /// - `body` - 上游响应体文本（作为 details 保留）
    pub fn from_upstream_status(status: u16, body: String) -> Self {
        let kind = match status {
            401 => RelayErrorKind::UpstreamAuthInvalid,
            402 => RelayErrorKind::UpstreamQuotaExhausted,
            429 => RelayErrorKind::UpstreamRateLimited,
            _ => RelayErrorKind::UpstreamTransportFailure,
        };
        Self::new(kind, body)
    }

    /// 该分类的 HTTP 等价状态码
    pub fn status_code(&self) -> u16 {
        match self.kind {
            RelayErrorKind::InvalidRequest => 400,
            RelayErrorKind::AuthorizationDenied => 403,
            RelayErrorKind::UpstreamAuthInvalid => 401,
            RelayErrorKind::UpstreamQuotaExhausted => 402,
            RelayErrorKind::UpstreamRateLimited => 429,
            RelayErrorKind::UpstreamTransportFailure => 502,
        }
    }

    /// 面向用户的一句话消息（含处置建议）
    ///
    /// 每个分类的措辞固定，前端据此展示统一的错误条。
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            RelayErrorKind::InvalidRequest => "请求不合法，请检查提示词后重试",
            RelayErrorKind::AuthorizationDenied => "当前订阅档位无权使用该模型",
            RelayErrorKind::UpstreamQuotaExhausted => {
                "模型配额已耗尽，请充值后再试"
            }
            RelayErrorKind::UpstreamAuthInvalid => {
                "上游 API 认证失败，请检查密钥配置"
            }
            RelayErrorKind::UpstreamRateLimited => {
                "请求过于频繁，请稍等片刻后重试"
            }
            RelayErrorKind::UpstreamTransportFailure => {
                "生成服务暂时不可用，请稍后重试"
            }
        }
    }

    /// 转换为流式协议的终结 `error` 事件
    pub fn to_event(&self) -> DeliveryEvent {
        DeliveryEvent::Error {
            message: self.user_message().to_string(),
            details: self.details.clone(),
            status_code: self.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_mapping() {
        let e = RelayError::from_upstream_status(402, "quota".into());
        assert_eq!(e.kind, RelayErrorKind::UpstreamQuotaExhausted);
        assert_eq!(e.status_code(), 402);

        let e = RelayError::from_upstream_status(401, String::new());
        assert_eq!(e.kind, RelayErrorKind::UpstreamAuthInvalid);

        let e = RelayError::from_upstream_status(429, String::new());
        assert_eq!(e.kind, RelayErrorKind::UpstreamRateLimited);

        // 未知状态码归入传输失败
        let e = RelayError::from_upstream_status(500, String::new());
        assert_eq!(e.kind, RelayErrorKind::UpstreamTransportFailure);
        assert_eq!(e.status_code(), 502);
    }

    #[test]
    fn test_to_event_carries_taxonomy() {
        let e = RelayError::from_upstream_status(429, "retry later".into());
        match e.to_event() {
            DeliveryEvent::Error {
                status_code,
                details,
                ..
            } => {
                assert_eq!(status_code, 429);
                assert_eq!(details, "retry later");
            }
            other => panic!("期望 error 事件，实际为 {:?}", other),
        }
    }
}
