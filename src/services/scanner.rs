//! # 轻量级源码结构扫描器
//!
//! 对组件源码做一次语法感知的结构扫描，供归一化阶段做形状分类。
//! 不是完整解析器，但识别的是**结构**而非文本：
//! - 字符串（单引号 / 双引号 / 模板字符串，含 `${}` 内嵌表达式）
//!   和注释（行注释 / 块注释）内的内容不参与任何结构判断
//! - 跟踪花括号 / 圆括号 / 方括号的配对深度
//! - 报告顶层声明（function / const / let / var）、顶层 return 语句，
//!   以及具名函数体内是否存在 return
//!
//! 相比子串匹配，结构扫描可以正确处理"return 语句内嵌套了
//! 函数表达式"之类在纯文本匹配下必然误判的输入。

/// 顶层声明的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `function Name(...) { ... }` 函数声明
    Function,
    /// `const Name = (...) => ...` / `const Name = function ...` 可调用绑定
    ConstCallable,
    /// `const Name = <非可调用初始化器>` 普通绑定
    ConstOther,
}

/// 一条顶层声明
#[derive(Debug, Clone)]
pub struct Decl {
    /// 声明的名称（匿名函数表达式不会出现在顶层声明列表中）
    pub name: String,
    /// 声明种类
    pub kind: DeclKind,
    /// 可调用声明的函数体（或箭头函数体）内是否存在输出表达式：
    /// - 函数体包含 `return` 关键字 → true
    /// - 箭头函数采用表达式体（隐式返回）→ true
    pub has_return: bool,
}

/// 一次结构扫描的结果
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// 按出现顺序排列的顶层声明
    pub decls: Vec<Decl>,
    /// 深度 0 处是否存在 `return` 语句（裸 return 表达式形状）
    pub has_top_level_return: bool,
}

impl ScanResult {
    /// 按名称查找顶层声明
    pub fn find_decl(&self, name: &str) -> Option<&Decl> {
        self.decls.iter().find(|d| d.name == name)
    }

    /// 第一个可调用的顶层声明（function 或 const 可调用绑定）
    pub fn first_callable(&self) -> Option<&Decl> {
        self.decls
            .iter()
            .find(|d| matches!(d.kind, DeclKind::Function | DeclKind::ConstCallable))
    }
}

/// 词法上下文：用于计算代码掩码的状态机
enum Ctx {
    /// 普通代码区（携带本层累计的花括号深度，用于模板表达式闭合判断）
    Code { brace_depth: i32 },
    /// 模板字符串内部
    Template,
}

/// 计算代码掩码：`mask[i] == true` 表示字节 `i` 位于真实代码区
///
/// 字符串字面量（含引号本身）、注释（含定界符）标记为 false；
/// 模板字符串的 `${ ... }` 内嵌表达式标记为 true。
///
/// 扫描按字节进行；多字节 UTF-8 序列不可能包含 ASCII 结构字符，
/// 逐字节处理是安全的。
fn code_mask(src: &str) -> Vec<bool> {
    let bytes = src.as_bytes();
    let mut mask = vec![false; bytes.len()];
    let mut stack: Vec<Ctx> = vec![Ctx::Code { brace_depth: 0 }];
    let mut i = 0;

    while i < bytes.len() {
        let top_is_code = matches!(stack.last(), Some(Ctx::Code { .. }));

        if top_is_code {
            match bytes[i] {
                b'\'' | b'"' => {
                    // 普通字符串：掩码 false，处理转义，直到闭合引号或行尾
                    let quote = bytes[i];
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                        if bytes[i] == b'\\' {
                            i += 1; // 跳过被转义字符
                        }
                        i += 1;
                    }
                    i += 1; // 闭合引号（或换行）
                    continue;
                }
                b'`' => {
                    stack.push(Ctx::Template);
                    i += 1;
                    continue;
                }
                b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                    // 行注释：掩码 false 到行尾
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                    // 块注释：掩码 false 到 "*/"
                    i += 2;
                    while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                        i += 1;
                    }
                    i = (i + 2).min(bytes.len());
                    continue;
                }
                b'{' => {
                    if let Some(Ctx::Code { brace_depth }) = stack.last_mut() {
                        *brace_depth += 1;
                    }
                    mask[i] = true;
                    i += 1;
                    continue;
                }
                b'}' => {
                    let close_template = match stack.last_mut() {
                        Some(Ctx::Code { brace_depth }) => {
                            if *brace_depth == 0 {
                                // 本层没有未闭合的花括号：这是 ${ 的闭合
                                true
                            } else {
                                *brace_depth -= 1;
                                false
                            }
                        }
                        _ => false,
                    };
                    if close_template && stack.len() > 1 {
                        stack.pop(); // 回到模板字符串上下文
                    } else {
                        mask[i] = true;
                    }
                    i += 1;
                    continue;
                }
                _ => {
                    mask[i] = true;
                    i += 1;
                    continue;
                }
            }
        }

        // 模板字符串内部
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                stack.pop();
                i += 1;
            }
            b'$' if i + 1 < bytes.len() && bytes[i + 1] == b'{' => {
                // 进入内嵌表达式：新的代码层
                stack.push(Ctx::Code { brace_depth: 0 });
                i += 2;
            }
            _ => i += 1,
        }
    }
    mask
}

/// 判断字节是否为标识符组成字符
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// 在 `pos` 处的代码区内检测关键字（带词边界校验）
fn keyword_at(src: &str, mask: &[bool], pos: usize, kw: &str) -> bool {
    let bytes = src.as_bytes();
    if pos + kw.len() > bytes.len() || !mask[pos] {
        return false;
    }
    if &bytes[pos..pos + kw.len()] != kw.as_bytes() {
        return false;
    }
    // 左边界：前一字节不是标识符字符
    if pos > 0 && is_ident_byte(bytes[pos - 1]) {
        return false;
    }
    // 右边界：后一字节不是标识符字符
    if pos + kw.len() < bytes.len() && is_ident_byte(bytes[pos + kw.len()]) {
        return false;
    }
    true
}

/// 从 `pos` 起跳过空白
fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// 从 `pos` 起读取一个标识符，返回 `(标识符, 结束位置)`
fn read_ident(src: &str, pos: usize) -> (String, usize) {
    let bytes = src.as_bytes();
    let mut end = pos;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    (src[pos..end].to_string(), end)
}

/// 找到与 `open_pos` 处开括号配对的闭括号位置（仅统计代码区字符）
///
/// # 返回值
/// 闭括号的字节位置；配对缺失时返回 None（截断输入容错）
fn matching_close(
    src: &str,
    mask: &[bool],
    open_pos: usize,
    open: u8,
    close: u8,
) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(open_pos) {
        if !mask[i] {
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// 检查 `[start, end)` 区间的代码区内是否出现 `return` 关键字
fn region_has_return(src: &str, mask: &[bool], start: usize, end: usize) -> bool {
    let end = end.min(src.len());
    let mut i = start;
    while i < end {
        if keyword_at(src, mask, i, "return") {
            return true;
        }
        // 整体跳过标识符，避免在标识符中间逐字节比对
        if mask[i] && is_ident_byte(src.as_bytes()[i]) {
            let (_, next) = read_ident(src, i);
            i = next.max(i + 1);
        } else {
            i += 1;
        }
    }
    false
}

/// 对源码执行一次结构扫描
///
/// # 参数
/// - `src` - 组件源码（通常已经过 import 剥离，但不做强制要求）
///
/// # 返回值
/// 顶层声明列表和顶层 return 标志
pub fn scan(src: &str) -> ScanResult {
    let mask = code_mask(src);
    let bytes = src.as_bytes();

    let mut decls = Vec::new();
    let mut has_top_level_return = false;

    // 深度统计：花括号 + 圆括号 + 方括号，仅代码区字符参与
    let mut depth = 0i32;
    let mut i = 0;

    while i < bytes.len() {
        if !mask[i] {
            i += 1;
            continue;
        }
        let b = bytes[i];

        match b {
            b'{' | b'(' | b'[' => {
                depth += 1;
                i += 1;
                continue;
            }
            b'}' | b')' | b']' => {
                depth -= 1;
                i += 1;
                continue;
            }
            _ => {}
        }

        if depth == 0 && is_ident_byte(b) && (i == 0 || !is_ident_byte(bytes[i - 1])) {
            // 顶层修饰符 export / default：跳过后由后续迭代重新判定
            let mut skipped_modifier = false;
            for modifier in ["export", "default"] {
                if keyword_at(src, &mask, i, modifier) {
                    i += modifier.len();
                    skipped_modifier = true;
                    break;
                }
            }
            if skipped_modifier {
                continue;
            }

            // async function：跳过 async 让 function 分支处理
            if keyword_at(src, &mask, i, "async") {
                let after = skip_ws(bytes, i + "async".len());
                if keyword_at(src, &mask, after, "function") {
                    i = after;
                    continue;
                }
            }

            if keyword_at(src, &mask, i, "return") {
                has_top_level_return = true;
                i += "return".len();
                continue;
            }

            if keyword_at(src, &mask, i, "function") {
                let (decl, next) = parse_function_decl(src, &mask, i);
                if let Some(d) = decl {
                    decls.push(d);
                }
                i = next.max(i + 1);
                continue;
            }

            let mut matched_binding = false;
            for kw in ["const", "let", "var"] {
                if keyword_at(src, &mask, i, kw) {
                    let (decl, next) = parse_const_decl(src, &mask, i + kw.len());
                    if let Some(d) = decl {
                        decls.push(d);
                    }
                    i = next.max(i + 1);
                    matched_binding = true;
                    break;
                }
            }
            if matched_binding {
                continue;
            }

            // 普通标识符：整体跳过
            let (_, next) = read_ident(src, i);
            i = next.max(i + 1);
            continue;
        }

        i += 1;
    }

    ScanResult {
        decls,
        has_top_level_return,
    }
}

/// 解析 `function Name(...) { ... }` 声明
///
/// # 返回值
/// `(声明, 扫描继续位置)`；匿名函数或结构残缺时声明为 None。
/// 继续位置放在函数体之后：体内声明不属于顶层。
fn parse_function_decl(src: &str, mask: &[bool], kw_pos: usize) -> (Option<Decl>, usize) {
    let bytes = src.as_bytes();
    let mut pos = skip_ws(bytes, kw_pos + "function".len());

    // 函数名（匿名函数表达式不作为顶层声明）
    let (name, after_name) = read_ident(src, pos);
    if name.is_empty() {
        return (None, kw_pos + "function".len());
    }
    pos = skip_ws(bytes, after_name);

    // 参数表
    if pos >= bytes.len() || bytes[pos] != b'(' {
        return (None, after_name);
    }
    let Some(params_end) = matching_close(src, mask, pos, b'(', b')') else {
        return (None, src.len());
    };
    pos = skip_ws(bytes, params_end + 1);

    // 函数体
    if pos >= bytes.len() || bytes[pos] != b'{' {
        return (None, params_end + 1);
    }
    let body_end = matching_close(src, mask, pos, b'{', b'}').unwrap_or(src.len());
    let has_return = region_has_return(src, mask, pos + 1, body_end);

    (
        Some(Decl {
            name,
            kind: DeclKind::Function,
            has_return,
        }),
        body_end.saturating_add(1).min(src.len()),
    )
}

/// 解析 `const Name = <初始化器>` 声明，判断初始化器是否可调用
///
/// 可调用初始化器的三种形态：
/// - `function ...` / `async function ...`
/// - `(...) => ...` 括号参数箭头函数
/// - `x => ...` 单标识符参数箭头函数
///
/// # 返回值
/// `(声明, 扫描继续位置)`
fn parse_const_decl(src: &str, mask: &[bool], after_kw: usize) -> (Option<Decl>, usize) {
    let bytes = src.as_bytes();
    let pos = skip_ws(bytes, after_kw);

    let (name, after_name) = read_ident(src, pos);
    if name.is_empty() {
        return (None, after_kw);
    }
    let pos = skip_ws(bytes, after_name);

    // 必须是 `=` 赋值（而非 `==` 等比较）
    if pos >= bytes.len() || bytes[pos] != b'=' || bytes.get(pos + 1) == Some(&b'=') {
        return (None, after_name);
    }
    let mut init = skip_ws(bytes, pos + 1);
    if init >= bytes.len() {
        return (None, after_name);
    }

    // 形态 1：function / async function 表达式
    if keyword_at(src, mask, init, "async") {
        let after = skip_ws(bytes, init + "async".len());
        if keyword_at(src, mask, after, "function") {
            init = after;
        }
    }
    if keyword_at(src, mask, init, "function") {
        // 函数表达式体：第一个 `{` 的配对区间
        let body_start = bytes[init..]
            .iter()
            .position(|&b| b == b'{')
            .map(|off| init + off);
        let (has_return, next) = match body_start {
            Some(bs) => {
                let be = matching_close(src, mask, bs, b'{', b'}').unwrap_or(src.len());
                (
                    region_has_return(src, mask, bs + 1, be),
                    be.saturating_add(1).min(src.len()),
                )
            }
            None => (false, src.len()),
        };
        return (
            Some(Decl {
                name,
                kind: DeclKind::ConstCallable,
                has_return,
            }),
            next,
        );
    }

    // 形态 2：括号参数箭头函数 `(...) => ...`
    if bytes[init] == b'(' {
        if let Some(close) = matching_close(src, mask, init, b'(', b')') {
            let after = skip_ws(bytes, close + 1);
            if bytes.get(after) == Some(&b'=') && bytes.get(after + 1) == Some(&b'>') {
                return (Some(arrow_decl(src, mask, name, after + 2)), after + 2);
            }
        }
        // 括号起始但不是箭头函数：普通绑定
        return (
            Some(Decl {
                name,
                kind: DeclKind::ConstOther,
                has_return: false,
            }),
            init,
        );
    }

    // 形态 3：单标识符参数箭头函数 `x => ...`
    let (param, after_param) = read_ident(src, init);
    if !param.is_empty() {
        let after = skip_ws(bytes, after_param);
        if bytes.get(after) == Some(&b'=') && bytes.get(after + 1) == Some(&b'>') {
            return (Some(arrow_decl(src, mask, name, after + 2)), after + 2);
        }
    }

    (
        Some(Decl {
            name,
            kind: DeclKind::ConstOther,
            has_return: false,
        }),
        init,
    )
}

/// 构建箭头函数声明，区分块体（需要显式 return）和表达式体（隐式返回）
fn arrow_decl(src: &str, mask: &[bool], name: String, after_arrow: usize) -> Decl {
    let bytes = src.as_bytes();
    let body = skip_ws(bytes, after_arrow);
    let has_return = if bytes.get(body) == Some(&b'{') {
        // 块体：检查体内显式 return
        let be = matching_close(src, mask, body, b'{', b'}').unwrap_or(src.len());
        region_has_return(src, mask, body + 1, be)
    } else {
        // 表达式体：隐式返回
        true
    };
    Decl {
        name,
        kind: DeclKind::ConstCallable,
        has_return,
    }
}
