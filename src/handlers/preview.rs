//! # 预览文档装配处理
//!
//! `POST /api/preview`：接收组件源码和设备提示，返回完整的沙箱
//! 宿主 HTML 文档。
//!
//! 装配永远成功：源码的编译 / 挂载失败封闭在文档内部的看门狗
//! 诊断面板中，HTTP 层对合法请求一律返回 200。

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

use crate::handlers::{full_body, json_error, read_json, CanvasBody};
use crate::models::project::ENTRY_FILE;
use crate::services::harness::{self, HarnessRequest};

/// 处理一次预览装配请求
pub async fn handle(req: Request<Incoming>) -> Response<CanvasBody> {
    let request: HarnessRequest = match read_json(req).await {
        Ok(r) => r,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, &msg),
    };

    // sourceText 为空时回退到文件映射中的入口文件
    let source = if request.source_text.is_empty() {
        request
            .file_map
            .get(ENTRY_FILE)
            .cloned()
            .unwrap_or_default()
    } else {
        request.source_text.clone()
    };

    let document = harness::build_harness(&source, request.device_hint);
    log::debug!(
        "装配预览文档: device={:?} source_chars={}",
        request.device_hint,
        source.chars().count()
    );

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/html; charset=utf-8")
        .body(full_body(document))
        .unwrap_or_else(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, "响应构建失败"))
}
