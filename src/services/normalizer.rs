//! # 源码归一化服务
//!
//! 把任意提取出的组件源码改写为恰好包含一个入口组件 `App` 的
//! 可调用形态。沙箱装配阶段以 `App` 作为唯一入口挂载。
//!
//! ## 操作顺序（严格固定）
//! 1. 剥离外部模块 import / require / 动态 import 语句
//!    （预览运行时以预绑定全局提供所有库，内嵌 import 必然解析失败）
//! 2. 限定裸 hook 标识符（useState → React.useState 等）
//! 3. 中和可执行 URL scheme（javascript:），并清理前序替换
//!    遗留的悬空 scheme 词元
//! 4. 检测入口组件是否已存在；存在但缺少 return 时仅打标不修复
//!    （"在沙箱里响亮失败"而非静默吞掉，诊断面板会呈现）
//! 5. 不存在入口组件时按形状分类合成，优先级：
//!    (a) 裸 return 表达式 / 括号表达式 → 直接包进合成入口
//!    (b) 具名非入口可调用 → 原样保留，合成防御性调用入口
//!    (c) 其余（裸标记文本）→ 包进合成的 `return (...)` 中
//!
//! 形状检查必须先验 (a) 再验 (b)：return 语句内部完全可能嵌套
//! 表面上符合 function/const 模式的函数表达式，顺序颠倒会误分类。
//!
//! 归一化是预览时的视图层变换，结果不持久化；对已归一化的输入
//! 幂等（不会二次包裹）。

use std::sync::LazyLock;

use regex::Regex;

use crate::services::scanner::{self, DeclKind};

/// 入口组件的约定名称
pub const ENTRY_COMPONENT: &str = "App";

/// 归一化过程中记录的诊断标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeFlag {
    /// 入口组件已存在但检测不到 return：疑似生成缺陷，
    /// 不自动修复，由沙箱诊断面板呈现
    MissingReturn,
    /// 入口组件由归一化阶段合成
    SynthesizedEntry,
}

/// 归一化结果
///
/// `code` 保证恰好包含一个名为 [`ENTRY_COMPONENT`] 的无参可调用
/// 入口组件；`flags` 记录过程中的诊断信号。
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    /// 归一化后的源码
    pub code: String,
    /// 诊断标志
    pub flags: Vec<NormalizeFlag>,
}

/// 单行 import 语句：`import ... from '...'` / `import '...'`
static IMPORT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+[^;\n]*?['"][^'"\n]*['"]\s*;?\s*$\n?"#).unwrap()
});

/// require 赋值语句：`const X = require('...');`
static REQUIRE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:const|let|var)\s+[^;\n]*?=\s*require\s*\([^)\n]*\)\s*;?\s*$\n?"#)
        .unwrap()
});

/// 动态 import 语句行：`const m = await import('...');` / `import('...');`
static DYNAMIC_IMPORT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:(?:const|let|var)\s+[^;\n]*?=\s*)?(?:await\s+)?import\s*\([^)\n]*\)\s*;?\s*$\n?"#)
        .unwrap()
});

/// 孤立的 export 语句行：`export default App;`
static EXPORT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+default\s+\w+\s*;?\s*$\n?").unwrap());

/// 裸 hook 调用：前导字符不是 `.` 或标识符字符
static BARE_HOOK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<pre>^|[^.\w$])(?P<hook>use(?:State|Effect|Ref|Memo|Callback|Context|Reducer))\s*\(",
    )
    .unwrap()
});

/// 可执行 URL scheme（大小写不敏感）
static JS_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").unwrap());

/// 整行悬空的 scheme 词元
static STRAY_SCHEME_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*javascript\s*$\n?").unwrap());

/// 紧跟在 `return (` 或 `(` 之后的悬空 scheme 词元
static STRAY_SCHEME_AFTER_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<paren>\(\s*)javascript\b[ \t]*").unwrap());

/// 归一化入口：对提取出的源码执行完整归一化
///
/// # 参数
/// - `source` - 提取阶段输出的组件源码（保证非空）
///
/// # 返回值
/// [`NormalizedSource`]，其 `code` 恰好包含一个入口组件
pub fn normalize(source: &str) -> NormalizedSource {
    let mut flags = Vec::new();

    // ---- 操作 1：剥离外部模块引用 ----
    let code = strip_module_references(source);

    // ---- 操作 2：限定裸 hook 标识符 ----
    let code = qualify_bare_hooks(&code);

    // ---- 操作 3：中和可执行 URL scheme + 清理悬空词元 ----
    let code = neutralize_url_schemes(&code);

    // ---- 操作 4：入口组件检测 ----
    let scan = scanner::scan(&code);
    if let Some(entry) = scan.find_decl(ENTRY_COMPONENT) {
        if matches!(entry.kind, DeclKind::Function | DeclKind::ConstCallable) {
            if !entry.has_return {
                // 疑似生成缺陷：打标但不修复，沙箱侧以
                // "组件没有返回内容" 诊断类呈现
                log::warn!("入口组件 {} 缺少 return 语句，保留原样交由沙箱诊断", ENTRY_COMPONENT);
                flags.push(NormalizeFlag::MissingReturn);
            }
            return NormalizedSource {
                code: code.trim().to_string(),
                flags,
            };
        }
    }

    // ---- 操作 5：按形状分类合成入口组件 ----
    flags.push(NormalizeFlag::SynthesizedEntry);
    let trimmed = code.trim();

    // 形状 (a)：裸 return 表达式 / 括号表达式。
    // 必须先于 (b) 检查：return 的表达式树内可能嵌套函数表达式。
    if scan.has_top_level_return {
        return NormalizedSource {
            code: format!("function {}() {{\n{}\n}}", ENTRY_COMPONENT, trimmed),
            flags,
        };
    }
    if trimmed.starts_with('(') {
        return NormalizedSource {
            code: format!(
                "function {}() {{\n  return {};\n}}",
                ENTRY_COMPONENT,
                trimmed.trim_end_matches(';')
            ),
            flags,
        };
    }

    // 形状 (b)：具名非入口可调用 → 保留原样 + 合成防御性调用入口
    if let Some(callable) = scan.first_callable() {
        let name = callable.name.clone();
        return NormalizedSource {
            code: format!(
                "{}\n\nfunction {entry}() {{\n  if (typeof {name} === 'undefined') {{\n    return (\n      <div style={{{{ padding: '24px', color: '#b91c1c', fontFamily: 'monospace' }}}}>\n        组件 {name} 未定义，无法渲染\n      </div>\n    );\n  }}\n  return <{name} />;\n}}",
                trimmed,
                entry = ENTRY_COMPONENT,
                name = name,
            ),
            flags,
        };
    }

    // 形状 (c)：裸标记文本 → 包进合成的 return (...)
    NormalizedSource {
        code: format!(
            "function {}() {{\n  return (\n{}\n  );\n}}",
            ENTRY_COMPONENT, trimmed
        ),
        flags,
    }
}

/// 操作 1：剥离外部模块 import / require / 动态 import / export 语句
///
/// 预览运行时通过能力注入提供 React、ReactDOM 和图标垫片，
/// 任何内嵌模块引用都会在沙箱中解析失败，必须移除。
/// 多行 import（`import {\n a,\n b\n} from 'x';`）按行状态机处理。
fn strip_module_references(source: &str) -> String {
    // 单行形态先走正则
    let s = IMPORT_LINE_RE.replace_all(source, "");
    let s = REQUIRE_LINE_RE.replace_all(&s, "");
    let s = DYNAMIC_IMPORT_LINE_RE.replace_all(&s, "");
    let s = EXPORT_LINE_RE.replace_all(&s, "");
    // `export default function` → `function`（声明本身保留）
    let s = s.replace("export default function", "function");
    let s = s.replace("export default const", "const");
    let s = s.replace("export function", "function");
    let s = s.replace("export const", "const");

    // 多行 import：行状态机，从 `import` 行吞到含模块说明符引号的行
    let mut out = String::with_capacity(s.len());
    let mut in_import = false;
    for line in s.lines() {
        let trimmed = line.trim_start();
        if in_import {
            // 终止行：包含模块说明符（引号）或以分号结尾
            if trimmed.contains('\'') || trimmed.contains('"') || trimmed.ends_with(';') {
                in_import = false;
            }
            continue;
        }
        if trimmed.starts_with("import ") || trimmed.starts_with("import{") {
            // 单行形态已被正则移除，此处必然是多行 import 的起始行
            in_import = true;
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// 操作 2：限定裸 hook 标识符
///
/// 把未限定的 `useState(` 等改写为 `React.useState(`，使其解析到
/// 能力注入的运行时命名空间。已限定的出现（前导 `.`）不受影响，
/// 因此本操作幂等。
fn qualify_bare_hooks(source: &str) -> String {
    BARE_HOOK_RE
        .replace_all(source, "${pre}React.${hook}(")
        .into_owned()
}

/// 操作 3：中和可执行 URL scheme
///
/// `javascript:` 替换为无操作锚点 `#`；随后清理前序替换可能
/// 遗留的悬空 `javascript` 词元（整行悬空、或紧跟在 `return (` /
/// `(` 之后），清理不改变周围结构。
fn neutralize_url_schemes(source: &str) -> String {
    let s = JS_SCHEME_RE.replace_all(source, "#");
    let s = STRAY_SCHEME_LINE_RE.replace_all(&s, "");
    STRAY_SCHEME_AFTER_PAREN_RE
        .replace_all(&s, "${paren}")
        .into_owned()
}
