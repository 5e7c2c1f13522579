//! 顶层存储引擎：进程级共享状态 + 后台任务的启动与回收

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::collaborator::{NoopResourceGroup, OncePerThread, ResourceGroup, StorageMaintenance};
use crate::compaction::CompactionPool;
use crate::common::{OlapError, Result};
use crate::config::{EngineConfig, WorkerSettings};
use crate::field_type::CompactionType;
use crate::sweep::GarbageSweepTask;
use crate::tablet::TabletManager;
use crate::worker::{spawn_worker, FixedIntervalTask, ShutdownSignal, StartPolicy};

// ── schema change 计数 ────────────────────────────────────────────────────────

/// 正在运行的 schema change 数量
///
/// 由 schema change 子系统增减，导入限流等逻辑读取；后台调度本身只负责托管。
#[derive(Debug, Default)]
pub struct SchemaChangeCounter(AtomicU32);

impl SchemaChangeCounter {
    pub fn get(&self) -> u32 { self.0.load(Ordering::Acquire) }

    pub fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 已为 0 时保持 0 并告警
    pub fn decrement(&self) -> u32 {
        match self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)) {
            Ok(prev) => prev - 1,
            Err(_) => {
                warn!("schema change counter decremented below zero, ignored");
                0
            }
        }
    }

    /// 计数 +1，guard 释放时 -1
    pub fn enter(&self) -> SchemaChangeGuard<'_> {
        self.increment();
        SchemaChangeGuard(self)
    }
}

pub struct SchemaChangeGuard<'a>(&'a SchemaChangeCounter);

impl Drop for SchemaChangeGuard<'_> {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

// ── 后台线程 ──────────────────────────────────────────────────────────────────

struct BackgroundWorkers {
    signal:     Arc<ShutdownSignal>,
    daemons:    Vec<JoinHandle<()>>,
    compaction: CompactionPool,
}

impl BackgroundWorkers {
    fn shutdown(mut self) {
        self.signal.stop();
        for handle in self.daemons.drain(..) {
            let _ = handle.join();
        }
        self.compaction.join();
    }
}

enum WorkerState {
    NotStarted,
    Running(BackgroundWorkers),
    Stopped,
}

// ── StorageEngine ─────────────────────────────────────────────────────────────

/// 单节点 OLAP 存储引擎（后台维护视角）
pub struct StorageEngine {
    config:                EngineConfig,
    tablet_manager:        TabletManager,
    schema_change_counter: SchemaChangeCounter,
    maintenance:           Arc<dyn StorageMaintenance>,
    resource_group:        Arc<dyn ResourceGroup>,
    workers:               Mutex<WorkerState>,
}

impl StorageEngine {
    pub fn new(config: EngineConfig, maintenance: Arc<dyn StorageMaintenance>) -> Self {
        Self {
            config,
            tablet_manager:        TabletManager::new(),
            schema_change_counter: SchemaChangeCounter::default(),
            maintenance,
            resource_group:        Arc::new(OncePerThread::new(NoopResourceGroup)),
            workers:               Mutex::new(WorkerState::NotStarted),
        }
    }

    /// compaction 线程每轮加入的资源组
    pub fn with_resource_group(mut self, group: impl ResourceGroup + 'static) -> Self {
        self.resource_group = Arc::new(OncePerThread::new(group));
        self
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn tablet_manager(&self) -> &TabletManager { &self.tablet_manager }

    pub fn schema_change_counter(&self) -> &SchemaChangeCounter { &self.schema_change_counter }

    // ── 后台任务 ──────────────────────────────────────────────────────────────

    /// 启动全部后台线程，只能调用一次
    ///
    /// 返回值只表示线程是否全部启动成功；任一线程启动失败时，
    /// 已启动的线程会被停止并回收。
    pub fn start_bg_workers(&self) -> Result<()> {
        let mut state = self.workers.lock();
        if !matches!(*state, WorkerState::NotStarted) {
            return Err(OlapError::AlreadyStarted);
        }

        let settings = self.config.validated();
        let signal = ShutdownSignal::new();
        let mut daemons = Vec::new();
        if let Err(e) = self.spawn_daemons(&settings, &signal, &mut daemons) {
            signal.stop();
            daemons.into_iter().for_each(|h| { let _ = h.join(); });
            *state = WorkerState::Stopped;
            return Err(e);
        }

        let compaction = match CompactionPool::spawn(
            settings.base_compaction_threads,
            settings.base_compaction_interval,
            settings.cumulative_compaction_threads,
            settings.cumulative_compaction_interval,
            self.maintenance.clone(),
            self.resource_group.clone(),
            &signal,
        ) {
            Ok(pool) => pool,
            Err(e) => {
                // CompactionPool::spawn 失败时已触发停止信号
                daemons.into_iter().for_each(|h| { let _ = h.join(); });
                *state = WorkerState::Stopped;
                return Err(e);
            }
        };

        info!(
            base_compaction_threads = settings.base_compaction_threads,
            cumulative_compaction_threads = settings.cumulative_compaction_threads,
            "background workers started"
        );
        *state = WorkerState::Running(BackgroundWorkers { signal, daemons, compaction });
        Ok(())
    }

    fn spawn_daemons(
        &self,
        settings: &WorkerSettings,
        signal:   &Arc<ShutdownSignal>,
        out:      &mut Vec<JoinHandle<()>>,
    ) -> Result<()> {
        // snapshot / trash 目录清理
        out.push(spawn_worker(
            GarbageSweepTask::new(settings.garbage_sweep, self.maintenance.clone()),
            signal.clone(),
        )?);

        // 磁盘状态巡检
        let m = self.maintenance.clone();
        out.push(spawn_worker(
            FixedIntervalTask::new(
                "disk-stat-monitor", settings.disk_stat_monitor_interval, StartPolicy::ActFirst,
                move || m.sample_disk_stats(),
            ),
            signal.clone(),
        )?);

        // 无用索引清理
        let m = self.maintenance.clone();
        out.push(spawn_worker(
            FixedIntervalTask::new(
                "unused-index-cleaner", settings.unused_index_monitor_interval, StartPolicy::ActFirst,
                move || m.delete_unused_indexes(),
            ),
            signal.clone(),
        )?);

        // 文件句柄 cache 清理
        let m = self.maintenance.clone();
        out.push(spawn_worker(
            FixedIntervalTask::new(
                "fd-cache-cleaner", settings.fd_cache_clean_interval, StartPolicy::SleepFirst,
                move || { m.clean_fd_cache(); Ok(()) },
            ),
            signal.clone(),
        )?);
        Ok(())
    }

    /// 触发停止信号并等待全部后台线程退出；未启动或已停止时无操作
    pub fn stop_bg_workers(&self) {
        let prev = std::mem::replace(&mut *self.workers.lock(), WorkerState::Stopped);
        if let WorkerState::Running(workers) = prev {
            info!("stopping background workers");
            workers.shutdown();
        }
    }

    pub fn bg_workers_running(&self) -> bool {
        matches!(*self.workers.lock(), WorkerState::Running(_))
    }

    /// 某个 compaction 池中仍在运行的线程数
    pub fn running_compaction_workers(&self, ctype: CompactionType) -> usize {
        match &*self.workers.lock() {
            WorkerState::Running(w) => w.compaction.running(ctype),
            _ => 0,
        }
    }

    /// 除 compaction 池外仍在运行的后台线程数
    pub fn running_daemon_workers(&self) -> usize {
        match &*self.workers.lock() {
            WorkerState::Running(w) => w.daemons.iter().filter(|h| !h.is_finished()).count(),
            _ => 0,
        }
    }
}

impl Drop for StorageEngine {
    fn drop(&mut self) {
        self.stop_bg_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments_and_saturates_at_zero() {
        let c = SchemaChangeCounter::default();
        assert_eq!(c.increment(), 1);
        assert_eq!(c.increment(), 2);
        assert_eq!(c.decrement(), 1);
        assert_eq!(c.decrement(), 0);
        assert_eq!(c.decrement(), 0);
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn guard_restores_counter() {
        let c = SchemaChangeCounter::default();
        {
            let _a = c.enter();
            let _b = c.enter();
            assert_eq!(c.get(), 2);
        }
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn counter_is_consistent_under_contention() {
        let c = Arc::new(SchemaChangeCounter::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let _g = c.enter();
                    }
                    c.increment();
                })
            })
            .collect();
        handles.into_iter().for_each(|h| h.join().unwrap());
        assert_eq!(c.get(), 8);
    }
}
