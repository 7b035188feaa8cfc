//! # 数据模型模块
//!
//! 定义与前端 TypeScript 类型一一对应的 Rust 数据结构：
//! - `event` - 流式交付协议事件（DeliveryEvent）
//! - `project` - 生成请求与项目文件包（GenerationRequest、ProjectPayload）
//! - `error` - 错误分类体系（RelayError）
//! - `settings` - 服务配置（AppConfig）

pub mod error;
pub mod event;
pub mod project;
pub mod settings;
