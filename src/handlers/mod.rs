//! # HTTP 处理模块
//!
//! 服务的对外 HTTP 面：
//! - `POST /api/generate` - 流式生成（SSE 交付事件序列）
//! - `POST /api/preview` - 沙箱宿主文档装配
//! - `GET /api/projects/:name` - 按名取回最近生成的项目
//! - `GET /health` - 存活探针
//!
//! ## 响应体
//! 路由需要同时承载一次性响应（JSON、HTML）和流式响应（SSE），
//! 统一为 `BoxBody<Bytes, Infallible>`。

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;

use crate::models::settings::AppConfig;
use crate::services::store::ProjectStore;
use crate::services::upstream::UpstreamClient;

pub mod generate;
pub mod preview;
pub mod projects;

/// 统一响应体类型
pub type CanvasBody = BoxBody<Bytes, Infallible>;

/// 应用共享状态
///
/// 进程启动时构建一次，经由 `Arc` 注入每个连接任务。处理函数
/// 通过参数显式接收依赖，不访问进程级全局。
pub struct AppState {
    /// 服务配置
    pub config: AppConfig,
    /// 上游语言模型客户端（复用连接池）
    pub upstream: UpstreamClient,
    /// 最近生成项目的暂存区
    pub store: ProjectStore,
}

impl AppState {
    /// 从配置构建应用状态
    pub fn new(config: AppConfig) -> Self {
        let upstream = UpstreamClient::new(
            config.upstream_base_url.clone(),
            config.upstream_api_key.clone(),
        );
        let store = ProjectStore::new(config.store_capacity);
        Self {
            config,
            upstream,
            store,
        }
    }
}

/// 顶层路由
///
/// 未匹配的路径返回 404 JSON。处理函数内部的失败各自转换为
/// 相应的错误响应，本函数不向连接层传播业务错误。
pub async fn route(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Result<Response<CanvasBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    log::debug!("{} {}", method, path);

    let response = match (method, path.as_str()) {
        (Method::POST, "/api/generate") => generate::handle(state, req).await,
        (Method::POST, "/api/preview") => preview::handle(req).await,
        (Method::GET, "/health") => projects::health(),
        (Method::GET, p) if p.starts_with("/api/projects/") => {
            let name = p.trim_start_matches("/api/projects/");
            projects::get_project(state, name)
        }
        _ => json_error(StatusCode::NOT_FOUND, "未知路径"),
    };
    Ok(response)
}

/// 构造一次性字节响应体
pub fn full_body(data: impl Into<Bytes>) -> CanvasBody {
    Full::new(data.into()).boxed()
}

/// 构造统一结构的 JSON 错误响应
///
/// # 参数
/// - `status` - HTTP 状态码
/// - `message` - 用户可读的错误消息
pub fn json_error(status: StatusCode, message: &str) -> Response<CanvasBody> {
    let body = json!({ "error": message }).to_string();
    Response::builder()
        .status(status)
        .header("content-type", "application/json; charset=utf-8")
        .body(full_body(body))
        .unwrap_or_else(|_| Response::new(full_body("")))
}

/// 读取并反序列化 JSON 请求体
///
/// # 错误
/// 读取失败或 JSON 不合法时返回用户可读消息
pub async fn read_json<T: serde::de::DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, String> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| format!("读取请求体失败: {}", e))?
        .to_bytes();
    serde_json::from_slice(&bytes).map_err(|e| format!("请求体 JSON 不合法: {}", e))
}
