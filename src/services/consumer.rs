//! # 流消费方（客户端侧）
//!
//! 流式协议的客户端半边：把线级帧按序应用到累积状态上，
//! 强制执行协议不变式，在终结事件处切换展示模式。
//!
//! ## 展示语义
//! - `char` 事件逐个追加到展示缓冲（调用方可逐事件刷新，
//!   或按动画帧合批，只要观感连续）
//! - `complete` 切换到生成的项目文件包，触发宿主文档装配请求
//! - `error` 展示单条合并后的分类消息并恢复输入控件
//! - 用户中止是独立的静默结局：不走错误展示路径
//!
//! ## 协议校验
//! 消费方对收到的流做严格校验：totalLength 必须从 1 起严格 +1，
//! 终结事件之后不允许再有任何事件。违反即协议错误。

use crate::models::event::DeliveryEvent;
use crate::models::project::ProjectPayload;
use crate::utils::sse::SseFrame;

/// 代码变更触发自动刷新前的静默期（毫秒）
///
/// 编辑源码后等待该时长无新变更才发起预览重建，避免逐键重建。
pub const AUTO_REFRESH_DEBOUNCE_MS: u64 = 1500;

/// 消费方所处的阶段
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerPhase {
    /// 流式接收中：展示缓冲随 char 事件增长
    Streaming,
    /// 完成：已切换到项目文件包
    Completed,
    /// 失败：携带合并后的用户可见消息
    Failed {
        /// 合并后的展示消息（含处置建议）
        message: String,
        /// HTTP 等价状态码
        status_code: u16,
    },
    /// 用户中止：静默结局
    Aborted,
}

/// 流消费状态机
#[derive(Debug)]
pub struct ConsumerState {
    /// 逐字符累积的展示缓冲
    display: String,
    /// 已接收的字符数（用于 totalLength 校验）
    received: u64,
    /// 当前阶段
    phase: ConsumerPhase,
    /// complete 事件携带的项目文件包
    project: Option<ProjectPayload>,
    /// 手动刷新是否在途：自动刷新遇到在途手动刷新时短路放弃，
    /// 避免两次预览装配竞速展示错误结果
    manual_refresh_in_flight: bool,
}

impl ConsumerState {
    /// 创建处于流式接收阶段的消费状态
    pub fn new() -> Self {
        Self {
            display: String::new(),
            received: 0,
            phase: ConsumerPhase::Streaming,
            project: None,
            manual_refresh_in_flight: false,
        }
    }

    /// 当前展示缓冲
    pub fn display(&self) -> &str {
        &self.display
    }

    /// 当前阶段
    pub fn phase(&self) -> &ConsumerPhase {
        &self.phase
    }

    /// complete 后可用的项目文件包
    pub fn project(&self) -> Option<&ProjectPayload> {
        self.project.as_ref()
    }

    /// 输入控件是否应当可用（终结或中止后恢复）
    pub fn input_enabled(&self) -> bool {
        !matches!(self.phase, ConsumerPhase::Streaming)
    }

    /// 应用一个线级帧
    ///
    /// # 错误
    /// 协议不变式被违反时返回错误描述：
    /// - 终结事件之后又收到事件
    /// - totalLength 不是严格 +1 递增
    pub fn apply(&mut self, frame: SseFrame) -> Result<(), String> {
        // 哨兵：流正常关闭，不改变阶段
        let event = match frame {
            SseFrame::Sentinel => return Ok(()),
            SseFrame::Event(e) => e,
        };

        if !matches!(self.phase, ConsumerPhase::Streaming) {
            return Err(format!("协议违规：终结之后仍收到事件 {:?}", event));
        }

        match event {
            DeliveryEvent::Char { char, total_length } => {
                if total_length != self.received + 1 {
                    return Err(format!(
                        "协议违规：totalLength 期望 {}，实际 {}",
                        self.received + 1,
                        total_length
                    ));
                }
                self.received = total_length;
                self.display.push_str(&char);
                Ok(())
            }
            DeliveryEvent::Complete { project } => {
                self.project = Some(project);
                self.phase = ConsumerPhase::Completed;
                Ok(())
            }
            DeliveryEvent::Error {
                message,
                details,
                status_code,
            } => {
                // 单条合并消息：分类主句 + 细节
                let combined = if details.is_empty() {
                    message
                } else {
                    format!("{}（{}）", message, details)
                };
                self.phase = ConsumerPhase::Failed {
                    message: combined,
                    status_code,
                };
                Ok(())
            }
        }
    }

    /// 用户中止在途请求
    ///
    /// 中止不走错误展示路径：阶段置为 Aborted，输入控件恢复，
    /// 不产生任何错误消息。
    pub fn abort(&mut self) {
        if matches!(self.phase, ConsumerPhase::Streaming) {
            self.phase = ConsumerPhase::Aborted;
        }
    }

    /// 标记手动刷新开始 / 结束
    pub fn set_manual_refresh(&mut self, in_flight: bool) {
        self.manual_refresh_in_flight = in_flight;
    }

    /// 自动刷新是否应当放行
    ///
    /// 静默期判定由调用方的计时器完成；本方法只裁决与手动刷新
    /// 的竞争：手动刷新在途时自动刷新短路放弃。
    pub fn auto_refresh_allowed(&self) -> bool {
        !self.manual_refresh_in_flight
    }
}

impl Default for ConsumerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn char_frame(c: &str, n: u64) -> SseFrame {
        SseFrame::Event(DeliveryEvent::Char {
            char: c.into(),
            total_length: n,
        })
    }

    fn complete_frame() -> SseFrame {
        let mut files = BTreeMap::new();
        files.insert("App.jsx".to_string(), "function App(){}".to_string());
        SseFrame::Event(DeliveryEvent::Complete {
            project: ProjectPayload {
                files,
                project_name: "demo".into(),
            },
        })
    }

    #[test]
    fn test_accumulates_display_buffer() {
        let mut state = ConsumerState::new();
        state.apply(char_frame("你", 1)).unwrap();
        state.apply(char_frame("好", 2)).unwrap();
        assert_eq!(state.display(), "你好");
        assert!(!state.input_enabled());
    }

    #[test]
    fn test_complete_switches_to_project() {
        let mut state = ConsumerState::new();
        state.apply(char_frame("x", 1)).unwrap();
        state.apply(complete_frame()).unwrap();
        assert_eq!(state.phase(), &ConsumerPhase::Completed);
        assert!(state.project().is_some());
        assert!(state.input_enabled());
    }

    #[test]
    fn test_error_consolidates_message_and_reenables_input() {
        let mut state = ConsumerState::new();
        state
            .apply(SseFrame::Event(DeliveryEvent::Error {
                message: "请求过于频繁，请稍等片刻后重试".into(),
                details: "429 from upstream".into(),
                status_code: 429,
            }))
            .unwrap();
        match state.phase() {
            ConsumerPhase::Failed {
                message,
                status_code,
            } => {
                assert!(message.contains("请求过于频繁"));
                assert!(message.contains("429 from upstream"));
                assert_eq!(*status_code, 429);
            }
            other => panic!("期望 Failed，实际为 {:?}", other),
        }
        assert!(state.input_enabled());
    }

    #[test]
    fn test_rejects_event_after_terminal() {
        let mut state = ConsumerState::new();
        state.apply(complete_frame()).unwrap();
        assert!(state.apply(char_frame("x", 1)).is_err());
    }

    #[test]
    fn test_rejects_non_monotonic_total_length() {
        let mut state = ConsumerState::new();
        state.apply(char_frame("a", 1)).unwrap();
        // 跳号
        assert!(state.apply(char_frame("b", 3)).is_err());
    }

    #[test]
    fn test_sentinel_is_noop() {
        let mut state = ConsumerState::new();
        state.apply(char_frame("a", 1)).unwrap();
        state.apply(SseFrame::Sentinel).unwrap();
        assert_eq!(state.display(), "a");
    }

    /// 场景 E：中止是静默结局，不产生错误消息，控件恢复
    #[test]
    fn test_abort_is_silent_outcome() {
        let mut state = ConsumerState::new();
        state.apply(char_frame("a", 1)).unwrap();
        state.abort();
        assert_eq!(state.phase(), &ConsumerPhase::Aborted);
        assert!(state.input_enabled());
        assert!(!matches!(state.phase(), ConsumerPhase::Failed { .. }));
    }

    /// 端到端线级链路：中继 → SSE 编码 → 增量解码 → 消费状态机
    #[tokio::test]
    async fn test_end_to_end_wire_roundtrip() {
        use crate::services::relay::TokenRelay;
        use crate::utils::sse::{self, SseDecoder};
        use futures_util::stream;
        use tokio::sync::mpsc;

        let code = "function App() { return <div>端到端链路验证用的足够长组件源码</div>; }";
        let (tx, mut rx) = mpsc::channel(1024);
        let relay = TokenRelay::new(std::time::Duration::ZERO, 50);
        relay
            .relay(
                stream::iter(vec![Ok::<_, crate::models::error::RelayError>(
                    code.to_string(),
                )]),
                "端到端",
                tx,
            )
            .await;

        // 服务端编码为线级帧（哨兵由编码层收尾写出）
        let mut wire = Vec::new();
        while let Some(event) = rx.recv().await {
            wire.extend_from_slice(sse::encode_event(&event).as_bytes());
        }
        wire.extend_from_slice(sse::encode_sentinel().as_bytes());

        // 客户端按小块增量解码并应用到消费状态机
        let mut decoder = SseDecoder::new();
        let mut state = ConsumerState::new();
        for chunk in wire.chunks(7) {
            for frame in decoder.feed(chunk) {
                state.apply(frame).unwrap();
            }
        }

        assert_eq!(state.display(), code);
        assert_eq!(state.phase(), &ConsumerPhase::Completed);
        assert_eq!(state.project().unwrap().entry_source(), Some(code));
    }

    #[test]
    fn test_auto_refresh_short_circuits_on_manual() {
        let mut state = ConsumerState::new();
        assert!(state.auto_refresh_allowed());
        state.set_manual_refresh(true);
        assert!(!state.auto_refresh_allowed());
        state.set_manual_refresh(false);
        assert!(state.auto_refresh_allowed());
    }
}
