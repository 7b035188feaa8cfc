//! # 项目取回与存活探针处理
//!
//! - `GET /api/projects/:name` - 从暂存区按名取回项目文件包
//! - `GET /health` - 存活探针（负载均衡 / 部署脚本使用）

use std::sync::Arc;

use hyper::{Response, StatusCode};
use serde_json::json;

use crate::handlers::{full_body, json_error, AppState, CanvasBody};

/// 按项目名取回文件包
///
/// # 返回值
/// - 200 + 项目 JSON - 命中
/// - 404 - 不存在或已被淘汰
pub fn get_project(state: Arc<AppState>, name: &str) -> Response<CanvasBody> {
    if name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "项目名不能为空");
    }
    match state.store.get(name) {
        Some(project) => {
            let body = serde_json::to_string(&project)
                .unwrap_or_else(|_| "{}".to_string());
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json; charset=utf-8")
                .body(full_body(body))
                .unwrap_or_else(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, "响应构建失败"))
        }
        None => json_error(StatusCode::NOT_FOUND, "项目不存在或已过期"),
    }
}

/// 存活探针
pub fn health() -> Response<CanvasBody> {
    let body = json!({ "status": "ok" }).to_string();
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json; charset=utf-8")
        .body(full_body(body))
        .unwrap_or_else(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, "响应构建失败"))
}
