//! 后台任务调用的外部协作者
//!
//! 具体的 compaction 算法、trash 清理、磁盘巡检、索引与 FD cache 清理
//! 都由存储引擎的其它部分实现，这里只定义调度层依赖的接口。

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::Result;

/// 存储引擎对后台调度暴露的维护操作
///
/// 同一 tablet 不能被两个 compaction 线程同时处理，这一约束由实现方保证，
/// 调度层不做 tablet 级加锁。
pub trait StorageMaintenance: Send + Sync {
    /// 淘汰长时间未使用的文件句柄
    fn clean_fd_cache(&self);

    fn run_base_compaction(&self) -> Result<()>;

    fn run_cumulative_compaction(&self) -> Result<()>;

    /// 清理 trash / snapshot 目录，返回清理后的磁盘使用率（0~1）
    fn sweep_trash(&self) -> Result<f64>;

    /// 采样各数据盘的健康状态与使用量
    fn sample_disk_stats(&self) -> Result<()>;

    /// 删除已不被任何版本引用的索引
    fn delete_unused_indexes(&self) -> Result<()>;
}

/// 进程级资源隔离组（cgroup 一类）
pub trait ResourceGroup: Send + Sync {
    /// 把当前线程加入普通（非特权）工作负载组，必须幂等
    fn join_system_group(&self);

    /// 资源组子系统是否已完成初始化；未就绪时的加入不算数
    ///
    /// 子系统可能晚于后台线程初始化，就绪前的 `join_system_group` 是空操作。
    fn is_ready(&self) -> bool;
}

/// 不做任何隔离
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResourceGroup;

impl ResourceGroup for NoopResourceGroup {
    fn join_system_group(&self) {}

    fn is_ready(&self) -> bool { true }
}

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static JOINED_GROUPS: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
}

/// 记住每个线程是否已成功加入过资源组，重复调用只剩一次 thread-local 查询
///
/// compaction 线程在资源组初始化之前就已启动，所以每轮都要调用一次
/// `join_system_group`；在 `is_ready()` 为 true 之前不做记忆。
pub struct OncePerThread<G> {
    id:    u64,
    inner: G,
}

impl<G: ResourceGroup> OncePerThread<G> {
    pub fn new(inner: G) -> Self {
        Self { id: NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed), inner }
    }

    pub fn inner(&self) -> &G { &self.inner }
}

impl<G: ResourceGroup> ResourceGroup for OncePerThread<G> {
    fn join_system_group(&self) {
        if JOINED_GROUPS.with(|j| j.borrow().contains(&self.id)) {
            return;
        }
        let ready = self.inner.is_ready();
        self.inner.join_system_group();
        if ready {
            JOINED_GROUPS.with(|j| j.borrow_mut().insert(self.id));
        }
    }

    fn is_ready(&self) -> bool { self.inner.is_ready() }
}
