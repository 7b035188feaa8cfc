//! # 生成请求与项目文件包数据模型
//!
//! 定义生成流程的输入（`GenerationRequest`）和输出（`ProjectPayload`）。
//!
//! 对应前端 TypeScript 接口：`GenerationRequest`、`ProjectPayload`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 提示词长度上限（字符数）
///
/// 超过此长度的提示词在流打开之前即被拒绝（InvalidRequest）。
pub const MAX_PROMPT_CHARS: usize = 1000;

/// 项目文件包中的入口源文件路径
///
/// 沙箱预览和项目存取均以此文件为组件源码的权威位置。
pub const ENTRY_FILE: &str = "App.jsx";

/// 一次生成请求
///
/// 由上层协作方（已完成订阅档位与授权检查）提交，本核心信任
/// `model_id` 已经过授权，仅做存在性校验。请求不可变，消费一次。
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface GenerationRequest {
///   prompt: string;
///   modelId: string;
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// 用户的自然语言 UI 描述
    pub prompt: String,
    /// 目标语言模型标识符
    pub model_id: String,
}

impl GenerationRequest {
    /// 校验请求合法性
    ///
    /// 在流打开之前执行，不合法的请求以普通 JSON 错误响应拒绝，
    /// 不进入流式协议。
    ///
    /// # 参数
    /// - `allowed_models` - 配置中的模型白名单
    ///
    /// # 错误
    /// - 提示词去除首尾空白后为空
    /// - 提示词超过 [`MAX_PROMPT_CHARS`] 个字符
    /// - 模型标识不在白名单中
    pub fn validate(&self, allowed_models: &[String]) -> Result<(), String> {
        let trimmed = self.prompt.trim();
        if trimmed.is_empty() {
            return Err("提示词不能为空".to_string());
        }
        if self.prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(format!("提示词超过 {} 字符上限", MAX_PROMPT_CHARS));
        }
        if !allowed_models.iter().any(|m| m == &self.model_id) {
            return Err(format!("未知的模型标识: {}", self.model_id));
        }
        Ok(())
    }
}

/// 生成完成后的项目文件包
///
/// `files` 至少包含入口源文件 [`ENTRY_FILE`]。构建后不可变；
/// 外部持久化协作方可以存储该载荷，本核心不会读回。
///
/// 注意：`files` 中保存的是**归一化前**的源码，归一化是预览时
/// 的视图层变换，不落入持久数据。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    /// 文件路径 → 源码文本映射（BTreeMap 保证序列化顺序稳定）
    pub files: BTreeMap<String, String>,
    /// 项目名称：从提示词派生的可读短名
    pub project_name: String,
}

impl ProjectPayload {
    /// 从入口源码和提示词构建项目文件包
    ///
    /// # 参数
    /// - `source` - 入口组件源码（归一化前的原始提取结果）
    /// - `prompt` - 用户提示词，用于派生项目名
    pub fn from_source(source: String, prompt: &str) -> Self {
        let mut files = BTreeMap::new();
        files.insert(ENTRY_FILE.to_string(), source);
        Self {
            files,
            project_name: derive_project_name(prompt),
        }
    }

    /// 获取入口源文件内容
    pub fn entry_source(&self) -> Option<&str> {
        self.files.get(ENTRY_FILE).map(|s| s.as_str())
    }
}

/// 从提示词派生项目名称
///
/// 取提示词的前几个词，过滤为字母数字，小写化，短横线连接，
/// 截断到合理长度。提示词完全不可用时回退为 "untitled-ui"。
///
/// # 参数
/// - `prompt` - 用户提示词
///
/// # 返回值
/// 形如 "pricing-card-with-toggle" 的短横线连接名
fn derive_project_name(prompt: &str) -> String {
    let name: String = prompt
        .split_whitespace()
        .take(5)
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if name.is_empty() {
        "untitled-ui".to_string()
    } else {
        // 截断到 48 字符以内，避免超长提示词生成不可读名称
        name.chars().take(48).collect()
    }
}
