//! # SSE 线级编解码
//!
//! 服务端到客户端的线级协议：每个事件是一行 `data: ` 前缀的 JSON
//! 载荷，后跟一个空行；整条流以固定的结束哨兵行终止。
//!
//! 编码侧供 HTTP 处理层使用，解码侧供流消费方（客户端 / 测试）使用。

use crate::models::event::DeliveryEvent;

/// 流结束哨兵的载荷文本
pub const SENTINEL: &str = "[DONE]";

/// 把一个交付事件编码为一个 SSE 帧
///
/// # 返回值
/// `data: {json}\n\n` 形式的帧文本
pub fn encode_event(event: &DeliveryEvent) -> String {
    // DeliveryEvent 的序列化不可能失败（纯数据结构），
    // 防御性兜底为错误帧而不是 panic
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        format!(
            r#"{{"kind":"error","message":"事件序列化失败","details":"{}","statusCode":500}}"#,
            e
        )
    });
    format!("data: {}\n\n", json)
}

/// 编码流结束哨兵帧
pub fn encode_sentinel() -> String {
    format!("data: {}\n\n", SENTINEL)
}

/// 解码出的单个线级帧
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// 一个交付事件
    Event(DeliveryEvent),
    /// 流结束哨兵
    Sentinel,
}

/// 增量 SSE 解码器
///
/// 字节块按到达顺序喂入，完整帧（以空行定界）逐个产出；
/// 不完整的尾部留在内部缓冲等待后续字节。缓冲按字节保存，
/// 字节块在多字节 UTF-8 序列中间切开也不会损坏帧内容。
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// 创建空解码器
    pub fn new() -> Self {
        Self::default()
    }

    /// 喂入一个字节块，返回其中包含的所有完整帧
    ///
    /// 无法解析的帧（非 `data: ` 行、损坏的 JSON）静默跳过，
    /// 与解析容错策略一致：单帧损坏不应中断整条流。
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        // 帧定界：空行（\n\n）
        while let Some(pos) = memchr::memmem::find(&self.buf, b"\n\n") {
            let frame_bytes: Vec<u8> = self.buf.drain(..pos + 2).collect();
            let frame_text = String::from_utf8_lossy(&frame_bytes);
            if let Some(frame) = parse_frame(frame_text.trim_end()) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// 解析单个帧文本
///
/// # 返回值
/// - `Some(frame)` - 合法的事件帧或哨兵帧
/// - `None` - 非 data 行或损坏载荷
fn parse_frame(text: &str) -> Option<SseFrame> {
    let data = text
        .strip_prefix("data: ")
        .or_else(|| text.strip_prefix("data:"))?;
    if data.trim() == SENTINEL {
        return Some(SseFrame::Sentinel);
    }
    serde_json::from_str::<DeliveryEvent>(data)
        .ok()
        .map(SseFrame::Event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let event = DeliveryEvent::Char {
            char: "字".into(),
            total_length: 7,
        };
        let encoded = encode_event(&event);
        assert!(encoded.starts_with("data: "));
        assert!(encoded.ends_with("\n\n"));

        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(encoded.as_bytes());
        assert_eq!(frames, vec![SseFrame::Event(event)]);
    }

    #[test]
    fn test_sentinel_roundtrip() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(encode_sentinel().as_bytes());
        assert_eq!(frames, vec![SseFrame::Sentinel]);
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let event = DeliveryEvent::Char {
            char: "a".into(),
            total_length: 1,
        };
        let encoded = encode_event(&event);
        let (head, tail) = encoded.as_bytes().split_at(10);

        let mut decoder = SseDecoder::new();
        // 前半块不产出帧
        assert!(decoder.feed(head).is_empty());
        // 后半块补齐后产出完整帧
        let frames = decoder.feed(tail);
        assert_eq!(frames, vec![SseFrame::Event(event)]);
    }

    #[test]
    fn test_decoder_skips_corrupt_frame() {
        let mut decoder = SseDecoder::new();
        let mut input = String::from("data: {not json}\n\n");
        input.push_str(&encode_sentinel());
        let frames = decoder.feed(input.as_bytes());
        // 损坏帧被跳过，哨兵正常产出
        assert_eq!(frames, vec![SseFrame::Sentinel]);
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut input = String::new();
        for i in 1..=3u64 {
            input.push_str(&encode_event(&DeliveryEvent::Char {
                char: "x".into(),
                total_length: i,
            }));
        }
        input.push_str(&encode_sentinel());

        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(input.as_bytes());
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3], SseFrame::Sentinel);
    }
}
