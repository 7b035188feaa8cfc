//! # 业务服务模块
//!
//! 生成与预览流程的核心逻辑：
//! - `upstream` - 上游语言模型客户端（流式补全）
//! - `relay` - 令牌中继：增量流 → 逐字符交付事件序列
//! - `extractor` - 从模型回复中提取组件源码
//! - `scanner` - 源码结构扫描（声明、顶层 return、括号配对）
//! - `normalizer` - 源码归一化：使提取结果可在沙箱中独立求值
//! - `escape` - 源码嵌入宿主文档的转义层
//! - `harness` - 沙箱宿主文档装配
//! - `consumer` - 流消费方状态机（客户端侧协议校验）
//! - `store` - 最近生成项目的内存暂存区

pub mod consumer;
pub mod escape;
pub mod extractor;
pub mod harness;
pub mod normalizer;
pub mod relay;
pub mod scanner;
pub mod store;
pub mod upstream;
