//! # 源码提取服务
//!
//! 从模型返回的完整累积文本中剥离包裹的散文和 Markdown 围栏，
//! 分离出组件源码。
//!
//! ## 提取策略
//! 1. 优先查找带 UI 源码语言提示的围栏代码块（```jsx / tsx / javascript 等），
//!    命中则取其内部内容
//! 2. 未命中围栏时，将整段输入视为源码
//! 3. 结果短于最小可用长度（或为空）时，替换为保底占位组件
//!
//! 保底替换是硬性要求：管线绝不允许把"无可用源码"传递到本阶段之后。
//! 使用 `memchr::memmem` 在大段累积文本中做围栏标记搜索。

use memchr::memmem;

/// 识别为 UI 源码的围栏语言提示，按匹配优先级排列
///
/// 围栏形如 ```` ```jsx ````，提示词后必须紧跟换行（或回车换行）。
const FENCE_LANGS: &[&str] = &["jsx", "tsx", "javascript", "js", "react"];

/// 保底占位组件
///
/// 上游返回空文本或不可用片段时替换为此组件，保证下游归一化、
/// 转义和沙箱装配阶段永远收到语法上可成立的输入。
pub const PLACEHOLDER_COMPONENT: &str = r#"function App() {
  return (
    <div style={{ padding: '40px', textAlign: 'center', fontFamily: 'sans-serif' }}>
      <h2>预览占位组件</h2>
      <p>模型未返回可用的组件源码，这里展示的是保底占位内容。</p>
      <p>请调整提示词后重新生成。</p>
    </div>
  );
}"#;

/// 提取置信度信号
///
/// 下游据此决定是否记录诊断日志（Fallback 属于静默降级，
/// 不作为用户可见错误）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// 命中围栏代码块，取其内部内容
    Matched,
    /// 未找到围栏，整段输入视为源码
    Whole,
    /// 输入不可用，已替换为保底占位组件
    Fallback,
}

/// 从累积文本中提取组件源码
///
/// # 参数
/// - `text` - 模型返回的完整累积文本
/// - `min_viable_len` - 最小可用长度（字符数），低于该值触发保底替换
///
/// # 返回值
/// `(源码字符串, 提取置信度)`；源码保证非空（保底不变式）
pub fn extract_source(text: &str, min_viable_len: usize) -> (String, Extraction) {
    // 阶段 1：尝试围栏代码块
    if let Some(inner) = find_fenced_block(text) {
        let trimmed = inner.trim();
        if trimmed.chars().count() >= min_viable_len {
            return (trimmed.to_string(), Extraction::Matched);
        }
        // 围栏内容过短：继续走整段回退路径，而不是直接放弃
    }

    // 阶段 2：整段输入视为源码
    let whole = text.trim();
    if whole.chars().count() >= min_viable_len {
        return (whole.to_string(), Extraction::Whole);
    }

    // 阶段 3：保底占位组件（硬性要求，输出绝不为空）
    (PLACEHOLDER_COMPONENT.to_string(), Extraction::Fallback)
}

/// 查找第一个带 UI 语言提示的围栏代码块，返回其内部内容
///
/// 使用 `memmem::Finder` 搜索 "```" 标记，再校验紧随其后的
/// 语言提示词和换行。闭合围栏缺失时取到文本末尾（模型输出
/// 被截断的常见情形）。
///
/// # 参数
/// - `text` - 完整累积文本
///
/// # 返回值
/// - `Some(inner)` - 围栏内部内容（不含围栏行本身）
/// - `None` - 未找到带 UI 语言提示的围栏
fn find_fenced_block(text: &str) -> Option<&str> {
    let finder = memmem::Finder::new(b"```");
    let bytes = text.as_bytes();
    let mut at = 0;

    while let Some(pos) = finder.find(&bytes[at..]) {
        let open = at + pos;
        let after = &text[open + 3..];

        // 校验语言提示：```jsx\n 或 ```jsx\r\n
        for lang in FENCE_LANGS {
            if let Some(rest) = after.strip_prefix(lang) {
                let body = rest
                    .strip_prefix("\r\n")
                    .or_else(|| rest.strip_prefix('\n'));
                if let Some(body) = body {
                    // 查找闭合围栏；缺失时取到末尾（截断输出容错）
                    let end = memmem::find(body.as_bytes(), b"```")
                        .unwrap_or(body.len());
                    return Some(&body[..end]);
                }
            }
        }

        // 本围栏语言提示不匹配，跳过继续搜索下一处
        at = open + 3;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: usize = 50;

    #[test]
    fn test_extract_fenced_jsx() {
        let code = "function App() { return <div>一个足够长的组件源码示例内容</div>; }";
        let text = format!("好的，组件如下：\n```jsx\n{}\n```\n希望有帮助！", code);
        let (source, conf) = extract_source(&text, MIN);
        assert_eq!(conf, Extraction::Matched);
        assert_eq!(source, code);
    }

    #[test]
    fn test_extract_unclosed_fence() {
        // 模型输出被截断：围栏没有闭合，应取到文本末尾
        let code = "function App() { return <div>截断输出的组件源码示例，长度足够触发围栏提取</div>;";
        let text = format!("```jsx\n{}", code);
        let (source, conf) = extract_source(&text, MIN);
        assert_eq!(conf, Extraction::Matched);
        assert_eq!(source, code);
    }

    #[test]
    fn test_extract_whole_text() {
        let code = "function App() { return <span>没有围栏时整段文本直接视为源码内容</span>; }";
        let (source, conf) = extract_source(code, MIN);
        assert_eq!(conf, Extraction::Whole);
        assert_eq!(source, code);
    }

    #[test]
    fn test_fallback_on_empty_input() {
        let (source, conf) = extract_source("", MIN);
        assert_eq!(conf, Extraction::Fallback);
        assert!(!source.is_empty());
        assert!(source.contains("function App()"));
    }

    #[test]
    fn test_fallback_on_short_input() {
        let (source, conf) = extract_source("<div/>", MIN);
        assert_eq!(conf, Extraction::Fallback);
        assert_eq!(source, PLACEHOLDER_COMPONENT);
    }

    #[test]
    fn test_short_fence_falls_back() {
        // 围栏命中但内容过短：走保底路径，输出仍非空
        let (source, conf) = extract_source("```jsx\n<p/>\n```", MIN);
        assert_eq!(conf, Extraction::Fallback);
        assert!(!source.is_empty());
    }

    #[test]
    fn test_non_ui_fence_ignored() {
        let code = "function App() { return <div>python 围栏之后的真实组件源码，长度足够</div>; }";
        let text = format!("```python\nprint('hi')\n```\n```jsx\n{}\n```", code);
        let (source, conf) = extract_source(&text, MIN);
        assert_eq!(conf, Extraction::Matched);
        assert_eq!(source, code);
    }
}
