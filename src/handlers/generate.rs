//! # 流式生成处理
//!
//! `POST /api/generate`：校验请求 → 打开 SSE 响应 → 后台任务
//! 驱动「上游补全 → 令牌中继 → 事件编码」管线。
//!
//! ## 错误时序
//! - 流打开**之前**的失败（请求校验）以普通 JSON 400 响应拒绝
//! - 流打开**之后**的失败（上游连接、流中断）一律转换为流内
//!   恰好一个终结 `error` 事件，HTTP 状态保持 200
//!
//! ## 中止语义
//! 客户端断开连接 → 响应体流被丢弃 → 字节通道关闭 → 中继在
//! 下一次字符发送时察觉并停止消费上游。整条链路协作式退出，
//! 不产生错误事件。

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::{Request, Response, StatusCode};
use tokio::sync::mpsc;

use crate::handlers::{json_error, read_json, AppState, CanvasBody};
use crate::models::event::DeliveryEvent;
use crate::models::project::GenerationRequest;
use crate::services::relay::{RelayOutcome, TokenRelay};
use crate::utils::sse;

/// 事件通道容量
///
/// 中继逐字符写入且带节拍延迟，小容量足够；通道打满意味着
/// 客户端读取停滞，反压由 send 的等待自然形成。
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 处理一次生成请求
pub async fn handle(state: Arc<AppState>, req: Request<Incoming>) -> Response<CanvasBody> {
    let request: GenerationRequest = match read_json(req).await {
        Ok(r) => r,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, &msg),
    };

    // 流打开之前的校验失败走普通 JSON 响应
    if let Err(msg) = request.validate(&state.config.allowed_models) {
        log::info!("生成请求被拒绝: {}", msg);
        return json_error(StatusCode::BAD_REQUEST, &msg);
    }

    log::info!(
        "开始生成: model={} prompt_chars={}",
        request.model_id,
        request.prompt.chars().count()
    );

    // 字节通道：后台管线 → HTTP 响应体
    let (byte_tx, byte_rx) = mpsc::channel::<Bytes>(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(run_pipeline(state, request, byte_tx));

    let stream = futures_util::stream::unfold(byte_rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(Frame::data(chunk)), rx))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream; charset=utf-8")
        .header("cache-control", "no-cache")
        .body(StreamBody::new(stream).boxed())
        .unwrap_or_else(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, "响应构建失败"))
}

/// 后台生成管线：上游补全 → 中继 → SSE 编码 → 字节通道
///
/// 流结束哨兵在管线收尾处写出；客户端中止时哨兵发送失败并被
/// 静默丢弃，符合中止不产生任何后续帧的语义。
async fn run_pipeline(
    state: Arc<AppState>,
    request: GenerationRequest,
    byte_tx: mpsc::Sender<Bytes>,
) {
    let (event_tx, mut event_rx) = mpsc::channel::<DeliveryEvent>(EVENT_CHANNEL_CAPACITY);

    // 编码转发：交付事件 → SSE 帧字节
    let encoder_tx = byte_tx.clone();
    let encoder = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let frame = Bytes::from(sse::encode_event(&event));
            if encoder_tx.send(frame).await.is_err() {
                // 客户端断开：丢弃接收端，让中继察觉通道关闭
                return;
            }
        }
    });

    let outcome = match state
        .upstream
        .stream_completion(&request.prompt, &request.model_id)
        .await
    {
        Ok(deltas) => {
            let relay = TokenRelay::new(
                Duration::from_millis(state.config.char_delay_ms),
                state.config.min_viable_source_len,
            );
            relay.relay(deltas, &request.prompt, event_tx).await
        }
        Err(e) => {
            // 流已对客户端打开，上游打开失败转换为流内终结事件
            let _ = event_tx.send(e.to_event()).await;
            drop(event_tx);
            RelayOutcome::Errored(e)
        }
    };

    // 等待编码转发排空剩余事件后写出哨兵
    let _ = encoder.await;
    match outcome {
        RelayOutcome::Completed(project) => {
            log::info!("生成完成: project={}", project.project_name);
            state.store.put(project);
            let _ = byte_tx.send(Bytes::from(sse::encode_sentinel())).await;
        }
        RelayOutcome::Errored(e) => {
            log::warn!("生成失败（{}）: {}", e.status_code(), e.details);
            let _ = byte_tx.send(Bytes::from(sse::encode_sentinel())).await;
        }
        RelayOutcome::Aborted => {
            // 静默结局：不写哨兵，连接已不存在
        }
    }
}
