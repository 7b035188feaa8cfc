//! # 服务配置数据模型
//!
//! 定义 Prompt Canvas 服务进程的配置结构 `AppConfig`。
//!
//! ## 加载顺序
//! 1. 内置默认值
//! 2. `~/.prompt-canvas/config.json`（存在时逐字段覆盖）
//! 3. 环境变量（`CANVAS_PORT`、`CANVAS_UPSTREAM_URL`、`CANVAS_API_KEY`）
//!
//! 配置文件缺失不是错误：服务使用默认值即可运行（测试模式下
//! 上游地址可指向本地 mock）。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 逐字符交付的默认节拍间隔（毫秒）
///
/// 这是刻意的打字机视觉效果，不是性能约束；测试中可配置为 0。
pub const DEFAULT_CHAR_DELAY_MS: u64 = 20;

/// 提取结果的最小可用长度（字符数）
///
/// 提取出的源码短于该值时视为不可用，替换为保底占位组件。
pub const DEFAULT_MIN_VIABLE_SOURCE_LEN: usize = 50;

/// 服务配置
///
/// 所有字段带 serde 默认值，配置文件可以只写需要覆盖的字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// 监听端口
    pub listen_port: u16,
    /// 上游语言模型 API 基础地址
    pub upstream_base_url: String,
    /// 上游 API 密钥（通常经由环境变量注入，不写入配置文件）
    pub upstream_api_key: String,
    /// 模型白名单：请求中的 modelId 必须命中其一
    pub allowed_models: Vec<String>,
    /// 逐字符交付节拍（毫秒）
    pub char_delay_ms: u64,
    /// 提取结果最小可用长度
    pub min_viable_source_len: usize,
    /// 项目暂存区容量（LRU 条目数）
    pub store_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_port: 7420,
            upstream_base_url: "https://api.anthropic.com".to_string(),
            upstream_api_key: String::new(),
            allowed_models: vec![
                "canvas-small".to_string(),
                "canvas-large".to_string(),
            ],
            char_delay_ms: DEFAULT_CHAR_DELAY_MS,
            min_viable_source_len: DEFAULT_MIN_VIABLE_SOURCE_LEN,
            store_capacity: 32,
        }
    }
}

impl AppConfig {
    /// 获取配置文件路径（`~/.prompt-canvas/config.json`）
    ///
    /// # 错误
    /// 无法确定用户主目录（极端情况，如无 HOME 环境变量）时返回错误。
    pub fn config_path() -> Result<PathBuf, String> {
        let home = dirs::home_dir().ok_or_else(|| "无法获取用户主目录".to_string())?;
        Ok(home.join(".prompt-canvas").join("config.json"))
    }

    /// 加载配置：文件 + 环境变量覆盖
    ///
    /// 配置文件不存在时静默使用默认值；文件存在但解析失败时
    /// 返回错误（损坏的配置应当显式暴露而非静默忽略）。
    pub async fn load() -> Result<Self, String> {
        let mut config = match Self::config_path() {
            Ok(path) if path.exists() => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| format!("读取配置文件失败: {}", e))?;
                serde_json::from_str(&content)
                    .map_err(|e| format!("解析配置文件失败: {}", e))?
            }
            _ => Self::default(),
        };

        // 环境变量覆盖（部署环境优先于文件）
        if let Ok(port) = std::env::var("CANVAS_PORT") {
            if let Ok(p) = port.parse() {
                config.listen_port = p;
            }
        }
        if let Ok(url) = std::env::var("CANVAS_UPSTREAM_URL") {
            config.upstream_base_url = url;
        }
        if let Ok(key) = std::env::var("CANVAS_API_KEY") {
            config.upstream_api_key = key;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let c = AppConfig::default();
        assert_eq!(c.char_delay_ms, DEFAULT_CHAR_DELAY_MS);
        assert_eq!(c.min_viable_source_len, DEFAULT_MIN_VIABLE_SOURCE_LEN);
        assert!(!c.allowed_models.is_empty());
    }

    #[test]
    fn test_partial_config_file() {
        // 配置文件只覆盖部分字段，其余使用默认值
        let c: AppConfig = serde_json::from_str(r#"{ "listenPort": 9000 }"#).unwrap();
        assert_eq!(c.listen_port, 9000);
        assert_eq!(c.char_delay_ms, DEFAULT_CHAR_DELAY_MS);
    }
}
