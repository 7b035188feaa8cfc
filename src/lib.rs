//! # Prompt Canvas - 流式 UI 组件生成与预览服务核心
//!
//! 本模块负责服务的完整装配流程，包括：
//! - 加载配置并构建应用共享状态（上游客户端、项目暂存区）
//! - 绑定监听端口并启动 HTTP/1.1 接入循环
//! - 每个连接派生独立任务，经由路由分发到处理函数
//!
//! ## 架构说明
//! 核心逻辑放在 `lib.rs` 而非 `main.rs` 中，便于集成测试以库
//! 形式驱动各服务模块，`main.rs` 仅保留进程引导。
//!
//! ## 模块结构
//! - `handlers/` - HTTP 处理函数（对外接口层）
//! - `models/` - 数据模型（对应前端 TypeScript 类型）
//! - `services/` - 核心业务逻辑（中继、提取、归一化、装配）
//! - `utils/` - 通用工具函数（SSE 线级编解码）

pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use handlers::AppState;
use models::settings::AppConfig;

/// 启动服务并进入接入循环
///
/// 该函数完成以下工作：
/// 1. 从配置构建应用共享状态
/// 2. 绑定监听地址（`127.0.0.1:<listen_port>`）
/// 3. 逐连接派生任务，HTTP/1.1 协议处理交给 hyper
///
/// 函数正常情况下不返回；绑定失败时返回错误由入口进程退出。
///
/// # 参数
/// - `config` - 已加载的服务配置
///
/// # 错误
/// 端口绑定失败（被占用、权限不足）时返回错误描述
pub async fn run(config: AppConfig) -> Result<(), String> {
    let addr = format!("127.0.0.1:{}", config.listen_port);
    let state = Arc::new(AppState::new(config));

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("绑定 {} 失败: {}", addr, e))?;
    log::info!("Prompt Canvas 服务监听 {}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                // 单次 accept 失败不拖垮接入循环
                log::warn!("接受连接失败: {}", e);
                continue;
            }
        };
        log::debug!("新连接: {}", peer);

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handlers::route(Arc::clone(&state), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                // 客户端中途断开属于正常路径，记录为调试信息
                log::debug!("连接结束: {}", e);
            }
        });
    }
}
