//! # 沙箱宿主文档装配服务
//!
//! 给定转义后的组件源码和设备尺寸提示，装配一份完全自包含的
//! 可渲染 HTML 文档：运行时库引用、图标垫片、逐字嵌入的源码、
//! 以及一个有界的编译 / 挂载看门狗。
//!
//! ## 看门狗状态机
//! `WAIT_COMPILER (≤3s) → WAIT_ENTRY (总计 ≤15s) → MOUNTING → RENDERED`，
//! 任意状态超时或异常 → `FAILED`。失败类别严格区分：
//! - `compile-timeout` - 文档内编译器未就绪或转换超时
//! - `entry-missing` - 入口组件未定义
//! - `mount-threw` - 入口组件预检调用抛出异常
//! - `mount-empty` - 入口组件调用返回空
//!
//! `FAILED` 渲染结构化诊断面板（错误摘要、调用栈、固定的常见
//! 原因清单），空白失败页视为宿主自身的缺陷。
//!
//! ## 设计要点
//! - **显式编译信号**：直接调用 `Babel.transform` 并以 Promise 超时
//!   包裹，不做忙轮询等待编译副作用
//! - **能力注入**：编译产物在一个函数作用域内求值，`React`、
//!   `ReactDOM` 和图标垫片作为具名参数显式传入，不依赖对
//!   环境全局的隐式污染
//! - 文档是无状态值对象，每次预览请求重新装配，从不原地修改

use serde::{Deserialize, Serialize};

use crate::services::escape;
use crate::services::normalizer;

/// 预览设备尺寸提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceHint {
    /// 桌面：占满可用宽度
    #[default]
    Desktop,
    /// 平板：768px
    Tablet,
    /// 手机：390px
    Mobile,
}

impl DeviceHint {
    /// 该设备提示对应的内容区宽度（CSS 值）
    fn content_width(self) -> &'static str {
        match self {
            DeviceHint::Desktop => "100%",
            DeviceHint::Tablet => "768px",
            DeviceHint::Mobile => "390px",
        }
    }
}

/// 宿主文档装配请求
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface HarnessRequest {
///   sourceText: string;
///   fileMap?: Record<string, string>;
///   deviceHint?: 'desktop' | 'tablet' | 'mobile';
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessRequest {
    /// 组件源码（归一化前，装配流程内部完成归一化和转义）
    pub source_text: String,
    /// 项目文件映射（当前仅入口文件参与预览，保留字段以兼容协议）
    #[serde(default)]
    pub file_map: std::collections::BTreeMap<String, String>,
    /// 设备尺寸提示，缺省为桌面
    #[serde(default)]
    pub device_hint: DeviceHint,
}

/// 装配完整的宿主预览文档
///
/// 内部执行：归一化 → 转义 → 模板装配。归一化的 `MissingReturn`
/// 标志不阻断装配（沙箱侧以 `mount-empty` 诊断类呈现）。
///
/// # 参数
/// - `source` - 组件源码（归一化前）
/// - `device` - 设备尺寸提示
///
/// # 返回值
/// 完整的 HTML 文档字符串，HTTP 层永远以 200 返回
pub fn build_harness(source: &str, device: DeviceHint) -> String {
    let normalized = normalizer::normalize(source);
    let escaped = escape::escape_for_embed(&normalized.code);
    build_document(&escaped, device)
}

/// 用转义后的源码和设备提示装配文档
///
/// 模板使用占位符替换而非 format!（模板内大量 JS 花括号，
/// 逐一转义既易错又不可读）。
///
/// # 参数
/// - `escaped_source` - 已经过嵌入转义的源码
/// - `device` - 设备尺寸提示
pub fn build_document(escaped_source: &str, device: DeviceHint) -> String {
    HARNESS_TEMPLATE
        .replace("__CONTENT_WIDTH__", device.content_width())
        .replace("__ESCAPED_SOURCE__", escaped_source)
}

/// 宿主文档模板
///
/// 结构：
/// 1. 三个运行时库：UI 运行时（React）、DOM 挂载运行时（ReactDOM）、
///    文档内编译器（Babel standalone）
/// 2. 图标垫片：Proxy 兜底，常见图标名解析为 Unicode 字形组件
/// 3. 惰性 script 标签承载嵌入源码（type 非可执行，浏览器不解析）
/// 4. 看门狗脚本：显式编译信号 + 有界超时 + 区分失败类别的诊断面板
const HARNESS_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>组件预览</title>
<script crossorigin src="https://unpkg.com/react@18/umd/react.production.min.js"></script>
<script crossorigin src="https://unpkg.com/react-dom@18/umd/react-dom.production.min.js"></script>
<script id="compiler-script" src="https://unpkg.com/@babel/standalone/babel.min.js"></script>
<style>
  * { box-sizing: border-box; }
  body { margin: 0; font-family: system-ui, -apple-system, sans-serif; background: #f8fafc; }
  #preview-root { width: __CONTENT_WIDTH__; margin: 0 auto; min-height: 100vh; background: #ffffff; }
  .harness-diagnostic { padding: 24px; font-family: ui-monospace, monospace; color: #7f1d1d; background: #fef2f2; border: 1px solid #fecaca; border-radius: 8px; margin: 16px; }
  .harness-diagnostic h2 { margin-top: 0; font-size: 16px; }
  .harness-diagnostic pre { white-space: pre-wrap; word-break: break-all; background: #fff; padding: 12px; border-radius: 4px; font-size: 12px; }
  .harness-diagnostic ul { font-size: 13px; line-height: 1.8; }
</style>
</head>
<body>
<div id="preview-root"></div>

<!-- 嵌入源码：type 非可执行，浏览器不会解析其内容 -->
<script type="text/plain" id="embedded-source">__ESCAPED_SOURCE__</script>

<script>
(function () {
  'use strict';

  var COMPILER_TIMEOUT_MS = 3000;   // WAIT_COMPILER 上限
  var TOTAL_TIMEOUT_MS = 15000;     // WAIT_ENTRY 总上限
  var POST_MOUNT_CHECK_MS = 500;    // RENDERED 后的延迟子节点检查

  var rootEl = document.getElementById('preview-root');

  // ---- 失败类别（严格区分，不得合并）----
  var FAIL_CLASSES = {
    'compile-timeout': '文档内编译器未就绪或源码转换超时',
    'entry-missing': '入口组件 App 未定义',
    'mount-threw': '入口组件调用时抛出异常',
    'mount-empty': '入口组件没有返回内容'
  };

  var LIKELY_CAUSES = [
    '生成的源码存在语法错误，编译阶段即失败',
    '组件引用了沙箱未提供的外部库',
    '入口组件缺少 return 语句或返回了 null',
    '组件在渲染期间访问了未定义的变量',
    '网络原因导致运行时库未能加载'
  ];

  // 结构化诊断面板：空白失败页视为宿主自身缺陷
  function renderDiagnostic(failClass, error) {
    var causes = '';
    for (var i = 0; i < LIKELY_CAUSES.length; i++) {
      causes += '<li>' + LIKELY_CAUSES[i] + '</li>';
    }
    rootEl.innerHTML =
      '<div class="harness-diagnostic">' +
      '<h2>预览失败：' + (FAIL_CLASSES[failClass] || failClass) + '</h2>' +
      '<p>失败类别：<code>' + failClass + '</code></p>' +
      '<pre>' + String(error && error.stack ? error.stack : (error || '无调用栈')) + '</pre>' +
      '<p>常见原因：</p><ul>' + causes + '</ul>' +
      '</div>';
  }

  // 边界标记一律拼接构造：本脚本自身不能包含裸的脚本闭合标记
  var SCRIPT_CLOSE = '<' + '/script';
  var COMMENT_OPEN = '<' + '!--';
  var COMMENT_CLOSE = '--' + '>';

  // 还原嵌入转义（与服务端转义层严格互逆）
  function unescapeEmbedded(text) {
    return text
      .split('<\\/script').join(SCRIPT_CLOSE)
      .split('<\\!--').join(COMMENT_OPEN)
      .split('--\\>').join(COMMENT_CLOSE);
  }

  // 图标垫片：任何图标名都解析为一个 Unicode 字形兜底组件
  var ICON_GLYPHS = {
    Check: '✓', X: '✕', Plus: '+', Minus: '−',
    Star: '★', Heart: '♥', Search: '⌕', Menu: '☰',
    ArrowRight: '→', ArrowLeft: '←', ChevronDown: '⌄',
    ChevronUp: '⌃', Settings: '⚙', User: '☺',
    Mail: '✉', Trash: '⌦', Edit: '✎', Home: '⌂'
  };

  function makeIconShim(React) {
    return new Proxy({}, {
      get: function (_target, name) {
        var glyph = ICON_GLYPHS[name] || '□';
        return function IconFallback(props) {
          return React.createElement(
            'span',
            { 'aria-hidden': true, style: { display: 'inline-block', width: '1em', textAlign: 'center' } },
            glyph
          );
        };
      }
    });
  }

  function failClassOf(error) {
    return error && error.harnessFailClass ? error.harnessFailClass : 'compile-timeout';
  }

  function classified(failClass, message) {
    var e = new Error(message);
    e.harnessFailClass = failClass;
    return e;
  }

  // 显式编译就绪信号：监听编译器脚本的 load / error 事件并包裹
  // 有界超时，不做忙轮询
  function waitForCompiler(deadlineMs) {
    return new Promise(function (resolve, reject) {
      if (typeof Babel !== 'undefined') { resolve(); return; }
      var tag = document.getElementById('compiler-script');
      var timer = setTimeout(function () {
        reject(classified('compile-timeout', '编译器在 ' + deadlineMs + 'ms 内未就绪'));
      }, deadlineMs);
      tag.addEventListener('load', function () {
        clearTimeout(timer);
        resolve();
      });
      tag.addEventListener('error', function () {
        clearTimeout(timer);
        reject(classified('compile-timeout', '编译器脚本加载失败'));
      });
    });
  }

  function run() {
    var raw = document.getElementById('embedded-source').textContent;
    var source = unescapeEmbedded(raw);

    // ---- WAIT_COMPILER ----
    waitForCompiler(COMPILER_TIMEOUT_MS).then(function () {
      // ---- 编译：显式调用，同步产生成功 / 失败信号 ----
      var compiled;
      try {
        compiled = Babel.transform(source, { presets: ['react'] }).code;
      } catch (e) {
        e.harnessFailClass = 'compile-timeout';
        throw e;
      }

      // ---- WAIT_ENTRY / 能力注入求值 ----
      // 编译产物在函数作用域内求值，运行时能力作为具名参数传入；
      // 函数最后返回入口组件的引用（未定义时返回 undefined）
      var evaluate = new Function(
        'React', 'ReactDOM', 'LucideIcons',
        compiled + '\n;return (typeof App !== "undefined") ? App : undefined;'
      );

      var icons = makeIconShim(React);
      var App;
      try {
        App = evaluate(React, ReactDOM, icons);
      } catch (e) {
        e.harnessFailClass = 'mount-threw';
        throw e;
      }

      if (typeof App !== 'function') {
        throw classified('entry-missing', '求值完成但入口组件 App 未定义');
      }

      // ---- MOUNTING：预检调用 ----
      var preflight;
      try {
        preflight = App();
      } catch (e) {
        e.harnessFailClass = 'mount-threw';
        throw e;
      }
      if (preflight === null || preflight === undefined) {
        throw classified('mount-empty', '入口组件调用返回了 ' + String(preflight));
      }

      // ---- 真实挂载 ----
      var root = ReactDOM.createRoot(rootEl);
      root.render(React.createElement(App));

      // ---- RENDERED：延迟子节点检查 + 一次直挂兜底 ----
      setTimeout(function () {
        if (rootEl.childNodes.length === 0) {
          try {
            ReactDOM.render
              ? ReactDOM.render(React.createElement(App), rootEl)
              : root.render(React.createElement(App));
          } catch (e) {
            renderDiagnostic('mount-empty', e);
            return;
          }
          // 兜底挂载后仍为空：按 mount-empty 诊断
          setTimeout(function () {
            if (rootEl.childNodes.length === 0) {
              renderDiagnostic('mount-empty', '挂载完成但目标节点没有获得任何子内容');
            }
          }, POST_MOUNT_CHECK_MS);
        }
      }, POST_MOUNT_CHECK_MS);
    }).catch(function (error) {
      renderDiagnostic(failClassOf(error), error);
    });

    // 总体有界超时：任何状态停滞都不允许把页面留白
    setTimeout(function () {
      if (rootEl.childNodes.length === 0) {
        renderDiagnostic('compile-timeout', '预览在 ' + TOTAL_TIMEOUT_MS + 'ms 内未完成');
      }
    }, TOTAL_TIMEOUT_MS);
  }

  run();
})();
</script>
</body>
</html>
"##;
