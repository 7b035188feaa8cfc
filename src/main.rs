//! # Prompt Canvas - 服务进程入口点
//!
//! 本文件是服务进程的入口点。完成日志初始化与配置加载后，
//! 调用 `canvas_lib::run()` 启动 HTTP 接入循环。
//!
//! 核心逻辑位于 `lib.rs` 中，`main.rs` 仅负责进程引导。

/// 进程主入口函数
///
/// 初始化日志（`RUST_LOG` 控制级别，默认 info），加载配置
/// （文件 + 环境变量），随后将控制权交给 `canvas_lib::run()`。
#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match canvas_lib::models::settings::AppConfig::load().await {
        Ok(c) => c,
        Err(e) => {
            log::error!("配置加载失败: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = canvas_lib::run(config).await {
        log::error!("服务启动失败: {}", e);
        std::process::exit(1);
    }
}
