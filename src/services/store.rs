//! # 项目暂存区
//!
//! 最近生成的项目文件包的内存暂存层，供 `GET /api/projects/:name`
//! 按名取回。容量固定，满时淘汰最久未访问的条目。
//!
//! ## 线程安全
//! 使用 `std::sync::RwLock` 包装 `lru::LruCache`。HTTP 处理任务
//! 可能在不同线程上并发执行，锁粒度为单次存取，持锁期间无 I/O。
//!
//! 注意：`LruCache::get` 需要 `&mut self`（会更新访问顺序），
//! 因此读取同样走写锁。条目数量小（默认 32），竞争可忽略。

use std::num::NonZeroUsize;
use std::sync::RwLock;

use lru::LruCache;

use crate::models::project::ProjectPayload;

/// 项目暂存区
///
/// 进程级单例，经由应用状态注入各处理函数。
pub struct ProjectStore {
    entries: RwLock<LruCache<String, ProjectPayload>>,
}

impl ProjectStore {
    /// 创建指定容量的暂存区
    ///
    /// # 参数
    /// - `capacity` - 最大条目数，为 0 时按 1 处理
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(cap)),
        }
    }

    /// 存入一个项目文件包，以项目名为键
    ///
    /// 同名项目覆盖旧条目（最新一次生成为准）。
    pub fn put(&self, project: ProjectPayload) {
        if let Ok(mut cache) = self.entries.write() {
            cache.put(project.project_name.clone(), project);
        }
    }

    /// 按项目名取回文件包
    ///
    /// # 返回值
    /// - `Some(payload)` - 命中（访问顺序同时被刷新）
    /// - `None` - 不存在或已被淘汰
    pub fn get(&self, name: &str) -> Option<ProjectPayload> {
        let mut cache = self.entries.write().ok()?;
        cache.get(name).cloned()
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.entries.read().map(|c| c.len()).unwrap_or(0)
    }

    /// 暂存区是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
