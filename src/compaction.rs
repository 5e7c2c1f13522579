//! Compaction 线程池
//!
//! base / cumulative 两类 compaction 成本与节奏不同，各自独立成池，互不挤占。
//! 池大小在引擎启动时由配置决定，运行期不再调整。
//!
//! 每个线程每轮：加入系统资源组 → 执行一轮 compaction → 休眠检查间隔。

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::info;

use crate::collaborator::{ResourceGroup, StorageMaintenance};
use crate::common::Result;
use crate::field_type::CompactionType;
use crate::worker::{spawn_worker, MaintenanceTask, ShutdownSignal, StartPolicy};

/// 单个 compaction 线程的任务
pub struct CompactionTask {
    name:        String,
    ctype:       CompactionType,
    interval:    Duration,
    maintenance: Arc<dyn StorageMaintenance>,
    group:       Arc<dyn ResourceGroup>,
}

impl CompactionTask {
    pub fn new(
        index:       usize,
        ctype:       CompactionType,
        interval:    Duration,
        maintenance: Arc<dyn StorageMaintenance>,
        group:       Arc<dyn ResourceGroup>,
    ) -> Self {
        Self { name: thread_name(ctype, index), ctype, interval, maintenance, group }
    }
}

fn thread_name(ctype: CompactionType, index: usize) -> String {
    match ctype {
        CompactionType::Base       => format!("base-compact-{index}"),
        CompactionType::Cumulative => format!("cumu-compact-{index}"),
    }
}

impl MaintenanceTask for CompactionTask {
    fn name(&self) -> &str { &self.name }

    fn start_policy(&self) -> StartPolicy { StartPolicy::ActFirst }

    fn next_interval(&mut self) -> Duration { self.interval }

    fn run_once(&mut self) -> Result<()> {
        // 线程先于资源组初始化启动，必须每轮重新加入
        self.group.join_system_group();
        match self.ctype {
            CompactionType::Base       => self.maintenance.run_base_compaction(),
            CompactionType::Cumulative => self.maintenance.run_cumulative_compaction(),
        }
    }
}

/// 两个 compaction 池的线程句柄
#[derive(Default)]
pub struct CompactionPool {
    base:       Vec<JoinHandle<()>>,
    cumulative: Vec<JoinHandle<()>>,
}

impl CompactionPool {
    /// 启动 `base_threads` 个 base 线程和 `cumulative_threads` 个 cumulative 线程
    ///
    /// 任一线程创建失败时触发 `signal`，回收已启动的线程后返回错误。
    pub fn spawn(
        base_threads:        usize,
        base_interval:       Duration,
        cumulative_threads:  usize,
        cumulative_interval: Duration,
        maintenance:         Arc<dyn StorageMaintenance>,
        group:               Arc<dyn ResourceGroup>,
        signal:              &Arc<ShutdownSignal>,
    ) -> Result<Self> {
        let mut pool = Self::default();
        let plan = [
            (CompactionType::Base, base_threads, base_interval),
            (CompactionType::Cumulative, cumulative_threads, cumulative_interval),
        ];
        for (ctype, count, interval) in plan {
            info!(
                compaction = ctype.name(), threads = count,
                interval_us = interval.as_micros() as u64,
                "start compaction threads"
            );
            for i in 0..count {
                let task = CompactionTask::new(i, ctype, interval, maintenance.clone(), group.clone());
                match spawn_worker(task, signal.clone()) {
                    Ok(handle) => pool.handles_mut(ctype).push(handle),
                    Err(e) => {
                        signal.stop();
                        pool.join();
                        return Err(e);
                    }
                }
            }
        }
        Ok(pool)
    }

    fn handles_mut(&mut self, ctype: CompactionType) -> &mut Vec<JoinHandle<()>> {
        match ctype {
            CompactionType::Base       => &mut self.base,
            CompactionType::Cumulative => &mut self.cumulative,
        }
    }

    /// 仍在运行的线程数
    pub fn running(&self, ctype: CompactionType) -> usize {
        let handles = match ctype {
            CompactionType::Base       => &self.base,
            CompactionType::Cumulative => &self.cumulative,
        };
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// 等待全部线程退出，调用前需先触发停止信号
    pub fn join(&mut self) {
        for handle in self.base.drain(..).chain(self.cumulative.drain(..)) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::NoopResourceGroup;
    use crate::common::OlapError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        base:       AtomicUsize,
        cumulative: AtomicUsize,
    }

    impl StorageMaintenance for Counting {
        fn clean_fd_cache(&self) {}
        fn run_base_compaction(&self) -> Result<()> {
            self.base.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn run_cumulative_compaction(&self) -> Result<()> {
            self.cumulative.fetch_add(1, Ordering::SeqCst);
            Err(OlapError::collaborator("cumulative compaction", "no suitable version"))
        }
        fn sweep_trash(&self) -> Result<f64> { Ok(0.0) }
        fn sample_disk_stats(&self) -> Result<()> { Ok(()) }
        fn delete_unused_indexes(&self) -> Result<()> { Ok(()) }
    }

    #[test]
    fn thread_names_identify_pool_and_index() {
        assert_eq!(thread_name(CompactionType::Base, 0), "base-compact-0");
        assert_eq!(thread_name(CompactionType::Cumulative, 3), "cumu-compact-3");
    }

    #[test]
    fn each_pool_calls_its_own_collaborator() {
        let counting = Arc::new(Counting::default());
        let signal = ShutdownSignal::new();
        let mut pool = CompactionPool::spawn(
            2, Duration::from_millis(1),
            1, Duration::from_millis(1),
            counting.clone(), Arc::new(NoopResourceGroup), &signal,
        ).unwrap();

        while counting.base.load(Ordering::SeqCst) < 10
            || counting.cumulative.load(Ordering::SeqCst) < 10
        {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(pool.running(CompactionType::Base), 2);
        assert_eq!(pool.running(CompactionType::Cumulative), 1);

        signal.stop();
        pool.join();
        assert_eq!(pool.running(CompactionType::Base), 0);
    }

    #[test]
    fn empty_pools_spawn_nothing() {
        let signal = ShutdownSignal::new();
        let pool = CompactionPool::spawn(
            0, Duration::from_secs(1), 0, Duration::from_secs(1),
            Arc::new(Counting::default()), Arc::new(NoopResourceGroup), &signal,
        ).unwrap();
        assert_eq!(pool.running(CompactionType::Base), 0);
        assert_eq!(pool.running(CompactionType::Cumulative), 0);
    }
}
