//! # 令牌中继服务
//!
//! 消费上游补全流，把每个非空增量拆成单个字符逐一转发为 `char`
//! 交付事件，事件间插入固定节拍延迟（打字机视觉效果，刻意的
//! 产品选择而非性能约束，可配置）。上游结束后，把累积全文交给
//! 提取 → 归一化管线，构建项目文件包，发出恰好一个 `complete`
//! 终结事件。上游失败时按分类发出恰好一个 `error` 终结事件。
//!
//! ## 状态机
//! `Streaming → (上游结束) → Finalizing → Closed`
//! `Streaming → (上游失败) → Errored → Closed`
//! `Closed` 之后没有任何转移。
//!
//! ## 防御性写入
//! 输出通道已关闭（客户端提前断开或主动中止）时，后续写入一律
//! 静默丢弃而不是抛错：中止是独立的静默结局，不走错误展示路径，
//! 且必须让中继停止继续消费上游流（避免浪费成本）。协作式检查
//! 发生在字符发送之间，不是硬抢占。

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::models::error::RelayError;
use crate::models::event::DeliveryEvent;
use crate::models::project::ProjectPayload;
use crate::services::extractor::{self, Extraction};

/// 一次中继的最终结局
#[derive(Debug)]
pub enum RelayOutcome {
    /// 正常完成：complete 事件已发出，附项目文件包
    Completed(ProjectPayload),
    /// 上游失败：error 事件已发出（或通道已关闭被静默丢弃）
    Errored(RelayError),
    /// 客户端中止：未发出任何终结事件，静默结束
    Aborted,
}

/// 令牌中继
///
/// 每个生成请求创建一个实例，随请求任务消亡；无跨请求共享状态。
pub struct TokenRelay {
    /// 逐字符节拍间隔
    pacing: Duration,
    /// 提取阶段的最小可用长度
    min_viable_len: usize,
}

impl TokenRelay {
    /// 创建中继
    ///
    /// # 参数
    /// - `pacing` - 逐字符节拍间隔（测试中可为零）
    /// - `min_viable_len` - 提取结果最小可用长度
    pub fn new(pacing: Duration, min_viable_len: usize) -> Self {
        Self {
            pacing,
            min_viable_len,
        }
    }

    /// 执行中继：消费增量流，发出交付事件序列
    ///
    /// 事件经由 `tx` 交给 SSE 编码层；流结束哨兵由编码层在本函数
    /// 返回后写出，不属于事件序列本身。
    ///
    /// # 参数
    /// - `deltas` - 上游文本增量流
    /// - `prompt` - 用户提示词（用于派生项目名）
    /// - `tx` - 交付事件输出通道
    pub async fn relay<S>(
        &self,
        mut deltas: S,
        prompt: &str,
        tx: mpsc::Sender<DeliveryEvent>,
    ) -> RelayOutcome
    where
        S: Stream<Item = Result<String, RelayError>> + Unpin,
    {
        // ---- Streaming ----
        let mut accumulated = String::new();
        let mut total: u64 = 0;

        while let Some(item) = deltas.next().await {
            match item {
                Ok(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    for ch in delta.chars() {
                        accumulated.push(ch);
                        total += 1;
                        let event = DeliveryEvent::Char {
                            char: ch.to_string(),
                            total_length: total,
                        };
                        // 通道关闭 = 客户端中止：停止消费上游，静默结束
                        if tx.send(event).await.is_err() {
                            log::info!("客户端中止，中继在 {} 字符处停止", total);
                            return RelayOutcome::Aborted;
                        }
                        if !self.pacing.is_zero() {
                            tokio::time::sleep(self.pacing).await;
                        }
                    }
                }
                Err(e) => {
                    // ---- Errored → Closed ----
                    log::warn!("上游失败（{}）: {}", e.status_code(), e.details);
                    // 防御性写入：通道已关闭时丢弃而不报错
                    let _ = tx.send(e.to_event()).await;
                    return RelayOutcome::Errored(e);
                }
            }
        }

        // ---- Finalizing ----
        let (source, confidence) = extractor::extract_source(&accumulated, self.min_viable_len);
        if confidence == Extraction::Fallback {
            // 静默降级：不是用户可见错误，仅记录诊断
            log::warn!(
                "提取降级为保底占位组件（累积文本 {} 字符）",
                accumulated.chars().count()
            );
        }

        let project = ProjectPayload::from_source(source, prompt);
        let _ = tx
            .send(DeliveryEvent::Complete {
                project: project.clone(),
            })
            .await;

        // ---- Closed ----
        RelayOutcome::Completed(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    /// 零节拍中继，测试专用
    fn test_relay() -> TokenRelay {
        TokenRelay::new(Duration::ZERO, 50)
    }

    fn ok_deltas(parts: &[&str]) -> impl Stream<Item = Result<String, RelayError>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|s| Ok(s.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect_events(
        mut rx: mpsc::Receiver<DeliveryEvent>,
    ) -> Vec<DeliveryEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    /// 重建无损性：按序拼接 char 事件恰好还原累积全文
    #[tokio::test]
    async fn test_reconstruction_losslessness() {
        let text = "function App() { return <div>多字节字符也要无损重建</div>; }";
        let (tx, rx) = mpsc::channel(1024);
        let relay = test_relay();
        relay.relay(ok_deltas(&["function App() { return <div>多字节",
            "字符也要无损重建</div>; }"]), "测试", tx).await;

        let events = collect_events(rx).await;
        let reconstructed: String = events
            .iter()
            .filter_map(|e| match e {
                DeliveryEvent::Char { char, .. } => Some(char.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(reconstructed, text);
    }

    /// totalLength 从 1 开始严格 +1
    #[tokio::test]
    async fn test_total_length_strictly_increasing() {
        let (tx, rx) = mpsc::channel(1024);
        test_relay().relay(ok_deltas(&["abc", "", "de"]), "p", tx).await;

        let events = collect_events(rx).await;
        let lengths: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                DeliveryEvent::Char { total_length, .. } => Some(*total_length),
                _ => None,
            })
            .collect();
        assert_eq!(lengths, vec![1, 2, 3, 4, 5]);
    }

    /// 恰好一个终结事件，且之后没有任何事件
    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let (tx, rx) = mpsc::channel(1024);
        test_relay().relay(ok_deltas(&["hello"]), "p", tx).await;

        let events = collect_events(rx).await;
        let terminal_positions: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_terminal())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(terminal_positions.len(), 1);
        // 终结事件是最后一个
        assert_eq!(terminal_positions[0], events.len() - 1);
    }

    /// 上游失败：恰好一个 error 终结事件，携带分类
    #[tokio::test]
    async fn test_upstream_error_maps_to_single_error_event() {
        let deltas = stream::iter(vec![
            Ok("par".to_string()),
            Err(RelayError::from_upstream_status(429, "too many".into())),
        ]);
        let (tx, rx) = mpsc::channel(1024);
        let outcome = test_relay().relay(deltas, "p", tx).await;
        assert!(matches!(outcome, RelayOutcome::Errored(_)));

        let events = collect_events(rx).await;
        let terminals: Vec<&DeliveryEvent> =
            events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminals.len(), 1);
        match terminals[0] {
            DeliveryEvent::Error { status_code, .. } => assert_eq!(*status_code, 429),
            other => panic!("期望 error 事件，实际为 {:?}", other),
        }
    }

    /// 场景 D：上游返回空 → 保底占位组件仍然产出 complete
    #[tokio::test]
    async fn test_empty_upstream_yields_placeholder_complete() {
        let (tx, rx) = mpsc::channel(1024);
        let outcome = test_relay().relay(ok_deltas(&[]), "空输入", tx).await;

        match outcome {
            RelayOutcome::Completed(project) => {
                let source = project.entry_source().unwrap();
                assert!(!source.is_empty());
                assert!(source.contains("function App()"));
            }
            other => panic!("期望 Completed，实际为 {:?}", other),
        }
        let events = collect_events(rx).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    /// 场景 E：客户端中止 → 无 error 事件、无后续 char、静默结束
    #[tokio::test]
    async fn test_client_abort_is_silent() {
        // 容量 1 的通道：接收方收到若干事件后丢弃，发送端随即报关闭
        let (tx, mut rx) = mpsc::channel(1);
        let relay_task = tokio::spawn(async move {
            let long = "x".repeat(256);
            test_relay()
                .relay(ok_deltas(&[long.as_str()]), "p", tx)
                .await
        });

        // 收 3 个事件后模拟断开
        for _ in 0..3 {
            let e = rx.recv().await.unwrap();
            assert!(!e.is_terminal());
        }
        drop(rx);

        let outcome = relay_task.await.unwrap();
        assert!(matches!(outcome, RelayOutcome::Aborted));
    }

    /// complete 事件携带的项目文件包包含入口文件
    #[tokio::test]
    async fn test_complete_event_carries_entry_file() {
        let code = "function App() { return <div>一段长度足以通过提取阈值的组件源码</div>; }";
        let (tx, rx) = mpsc::channel(1024);
        test_relay().relay(ok_deltas(&[code]), "定价卡片", tx).await;

        let events = collect_events(rx).await;
        match events.last().unwrap() {
            DeliveryEvent::Complete { project } => {
                assert_eq!(project.entry_source(), Some(code));
                assert_eq!(project.project_name, "定价卡片");
            }
            other => panic!("期望 complete 事件，实际为 {:?}", other),
        }
    }
}
