//! # 交付事件数据模型
//!
//! 定义服务端到客户端流式协议的核心事件类型 `DeliveryEvent`。
//!
//! ## 协议约束
//! - `char` 事件的 `totalLength` 从 1 开始，每个事件严格 +1
//! - 每条流恰好包含一个终结事件（`complete` 或 `error`）
//! - 终结事件之后不再有任何事件，随后是流结束哨兵行
//!
//! 对应前端 TypeScript 类型：`DeliveryEvent`（tagged union，`kind` 字段区分）

use serde::{Deserialize, Serialize};

use crate::models::project::ProjectPayload;

/// 流式交付协议的单个事件
///
/// 使用 serde 的内部标签表示法（`kind` 字段）序列化为 tagged union，
/// 与前端的判别联合类型一一对应：
///
/// ```json
/// { "kind": "char", "char": "H", "totalLength": 1 }
/// { "kind": "complete", "project": { ... } }
/// { "kind": "error", "message": "...", "details": "...", "statusCode": 429 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeliveryEvent {
    /// 单字符事件：上游增量中的一个字符
    ///
    /// `char` 使用 String 而非 char，因为一个显示字符可能是
    /// 多字节 Unicode 标量值，序列化为 JSON 字符串最为稳妥。
    #[serde(rename_all = "camelCase")]
    Char {
        /// 本次交付的单个字符
        char: String,
        /// 截至本事件为止累计交付的字符总数（严格递增，从 1 开始）
        total_length: u64,
    },

    /// 完成事件：上游流正常结束，携带完整的项目文件包
    #[serde(rename_all = "camelCase")]
    Complete {
        /// 归一化前源码构成的项目文件包
        project: ProjectPayload,
    },

    /// 错误事件：上游失败时的终结事件，携带错误分类信息
    #[serde(rename_all = "camelCase")]
    Error {
        /// 面向用户的一句话错误描述
        message: String,
        /// 补充细节（上游原始错误文本或操作建议）
        details: String,
        /// HTTP 等价状态码（402/401/429/502 等）
        status_code: u16,
    },
}

impl DeliveryEvent {
    /// 判断该事件是否为终结事件（`complete` 或 `error`）
    ///
    /// 终结事件之后协议不允许再出现任何事件。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}
