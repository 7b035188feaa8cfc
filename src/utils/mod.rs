//! # 通用工具模块
//!
//! - `sse` - 流式协议的线级编解码

pub mod sse;
