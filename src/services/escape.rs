//! # 嵌入转义层
//!
//! 归一化后的源码要被逐字嵌入到生成的宿主文档里，而宿主文档本身
//! 由脚本边界标记和标记注释定界符构成结构。本层把源码中可能提前
//! 终结嵌入上下文的子串改写为无结构意义的形式，其余字符一律不动。
//!
//! ## 改写规则
//! | 原始子串 | 改写后 |
//! |----------|--------|
//! | `</script` | `<\/script` |
//! | `<!--` | `<\!--` |
//! | `-->` | `--\>` |
//!
//! ## 性质
//! - **幂等**：改写结果中不再含有任何原始标记，重复转义无变化
//! - **跨标记类型无序**：转义一类标记不会制造出另一类标记的新实例
//! - **可逆**：`unescape_embedded` 严格还原，往返无损

/// 转义规则表：`(原始子串, 转义形式)`
///
/// 三条规则的转义形式互不包含任何原始子串，保证幂等性和
/// 跨类型的顺序无关性。
const ESCAPE_PAIRS: &[(&str, &str)] = &[
    ("</script", r"<\/script"),
    ("<!--", r"<\!--"),
    ("-->", r"--\>"),
];

/// 转义源码以便逐字嵌入宿主文档
///
/// # 参数
/// - `source` - 归一化后的源码
///
/// # 返回值
/// 不含任何嵌入边界标记的等价源码
pub fn escape_for_embed(source: &str) -> String {
    let mut out = source.to_string();
    for (raw, escaped) in ESCAPE_PAIRS {
        out = out.replace(raw, escaped);
    }
    out
}

/// 还原嵌入转义（`escape_for_embed` 的逆操作）
///
/// 宿主文档内的运行时在取出嵌入源码后调用等价逻辑还原。
/// 往返性质：`unescape_embedded(escape_for_embed(s)) == s`
/// 对任何不含转义形式本身的输入 `s` 成立。
pub fn unescape_embedded(escaped: &str) -> String {
    let mut out = escaped.to_string();
    // 按与转义相同的表逆向替换
    for (raw, esc) in ESCAPE_PAIRS {
        out = out.replace(esc, raw);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_script_close() {
        let src = "const s = '</script>';";
        let escaped = escape_for_embed(src);
        assert!(!escaped.contains("</script"));
        assert!(escaped.contains(r"<\/script"));
    }

    #[test]
    fn test_escapes_comment_markers() {
        let src = "<!-- 注释 -->";
        let escaped = escape_for_embed(src);
        assert!(!escaped.contains("<!--"));
        assert!(!escaped.contains("-->"));
    }

    #[test]
    fn test_other_characters_untouched() {
        let src = "function App() { return <div>安全内容 < > -- </div>; }";
        assert_eq!(escape_for_embed(src), src);
    }

    #[test]
    fn test_idempotent() {
        let src = "</script> <!-- x --> plain";
        let once = escape_for_embed(src);
        let twice = escape_for_embed(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_cross_marker_creation() {
        // 转义一类标记不得拼出另一类标记：
        // 穷举两两相邻组合后逐一验证
        for (a, _) in ESCAPE_PAIRS {
            for (b, _) in ESCAPE_PAIRS {
                let combined = format!("{}{}", a, b);
                let escaped = escape_for_embed(&combined);
                for (raw, _) in ESCAPE_PAIRS {
                    assert!(
                        !escaped.contains(raw),
                        "转义 {:?} 后仍含标记 {:?}",
                        combined,
                        raw
                    );
                }
            }
        }
    }

    #[test]
    fn test_roundtrip() {
        let src = "const html = '<!-- </script> -->'; return <div dangerously={html}/>;";
        let escaped = escape_for_embed(src);
        assert_eq!(unescape_embedded(&escaped), src);
    }
}
