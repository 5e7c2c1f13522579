//! # olap-bg-worker 使用案例
//!
//! 1. 从 JSON 加载配置（含非法值，观察告警与回退）
//! 2. 注册 tablet 并发布若干版本
//! 3. 启动后台线程，由模拟的协作者执行 cumulative compaction 与 trash 清理
//! 4. 停止后台线程，查看合并结果

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use olap_bg_worker::{
    collaborator::StorageMaintenance,
    common::{OlapError, Result, TabletInfo, Version},
    config::EngineConfig,
    field_type::{CompactionType, Value},
    meta::{KeyRange, RowSetEntity, VersionEntity},
    storage::StorageEngine,
    tablet::TabletManager,
};

/// 模拟的维护协作者：cumulative compaction 把得分最高的 tablet 的增量版本合并成一个
///
/// 多个 compaction 线程共享同一个协作者，`compacting` 保证同一 tablet 不会被并发合并。
struct DemoMaintenance {
    engine:     parking_lot::Mutex<Weak<StorageEngine>>,
    compacting: parking_lot::Mutex<HashSet<TabletInfo>>,
    disk_usage: AtomicU64,
}

impl DemoMaintenance {
    fn tablets<T>(&self, f: impl FnOnce(&TabletManager) -> T) -> Option<T> {
        self.engine.lock().upgrade().map(|e| f(e.tablet_manager()))
    }
}

impl StorageMaintenance for DemoMaintenance {
    fn clean_fd_cache(&self) {}

    fn run_base_compaction(&self) -> Result<()> { Ok(()) }

    fn run_cumulative_compaction(&self) -> Result<()> {
        self.tablets(|mgr| {
            let Some((info, score)) = mgr
                .collect_compaction_candidates(CompactionType::Cumulative)
                .into_iter()
                .find(|(info, _)| self.compacting.lock().insert(*info))
            else {
                return Ok(());
            };
            let result = Self::merge_cumulative(mgr, info);
            self.compacting.lock().remove(&info);
            if result.is_ok() {
                println!("    cumulative compaction {info}: {score} rowsets → 1");
            }
            result
        })
        .unwrap_or(Ok(()))
    }

    fn sweep_trash(&self) -> Result<f64> {
        // 每次清理释放 5% 空间
        let now = self.disk_usage.load(Ordering::Relaxed).saturating_sub(5);
        self.disk_usage.store(now, Ordering::Relaxed);
        println!("    trash sweep done, disk usage = {now}%");
        Ok(now as f64 / 100.0)
    }

    fn sample_disk_stats(&self) -> Result<()> {
        if self.disk_usage.load(Ordering::Relaxed) > 95 {
            return Err(OlapError::collaborator("disk stat monitor", "disk almost full"));
        }
        Ok(())
    }

    fn delete_unused_indexes(&self) -> Result<()> { Ok(()) }
}

impl DemoMaintenance {
    fn merge_cumulative(mgr: &TabletManager, info: TabletInfo) -> Result<()> {
        let tablet = mgr.get_tablet(info)?;
        let point = tablet.cumulative_layer_point();
        let Some(max) = tablet.max_version() else { return Ok(()) };
        let inputs = tablet.capture_consistent_versions(point + 1, max.end)?;

        let merged_rows: i64 = inputs.iter().map(VersionEntity::num_rows).sum();
        let merged_size: u64 = inputs.iter().map(VersionEntity::data_size).sum();
        let mut output = VersionEntity::new(Version::new(point + 1, max.end), merged_rows);
        output.add_rowset_entity(RowSetEntity::new(
            1000, 1, merged_rows, merged_size, merged_size / 20, merged_rows == 0, None,
        ));
        for ve in &inputs {
            tablet.remove_version(ve.version);
        }
        tablet.add_version(output)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("【1】加载配置 ...");
    let config = EngineConfig::from_json_str(
        r#"{
            "base_compaction_num_threads": 1,
            "cumulative_compaction_num_threads": 2,
            "cumulative_compaction_check_interval_seconds": 0.2,
            "min_garbage_sweep_interval": 1,
            "max_garbage_sweep_interval": 10,
            "disk_stat_monitor_interval": -1
        }"#,
    )?;
    println!("    {config:?}\n");

    println!("【2】注册 tablet 并发布版本 ...");
    let maintenance = Arc::new(DemoMaintenance {
        engine:     parking_lot::Mutex::new(Weak::new()),
        compacting: parking_lot::Mutex::new(HashSet::new()),
        disk_usage: AtomicU64::new(90),
    });
    let engine = Arc::new(StorageEngine::new(config, maintenance.clone()));
    *maintenance.engine.lock() = Arc::downgrade(&engine);

    for tablet_id in [10001, 10002] {
        let tablet = engine.tablet_manager().create_tablet(TabletInfo::new(tablet_id, 368169781))?;
        for v in 0..6 {
            let mut ve = VersionEntity::new(Version::point(v), v);
            let stats = [KeyRange::new(Value::Int64(v * 100), Value::Int64(v * 100 + 99))];
            ve.add_rowset_entity(RowSetEntity::new(v as i32, 1, 100, 4096, 256, false, Some(&stats)));
            tablet.add_version(ve)?;
        }
        println!("    tablet {} versions = {}", tablet.info(), tablet.version_count());
    }
    println!();

    println!("【3】启动后台线程 ...");
    engine.start_bg_workers()?;
    std::thread::sleep(Duration::from_secs(3));

    println!("\n【4】停止后台线程 ...");
    engine.stop_bg_workers();
    for info in engine.tablet_manager().tablet_infos() {
        let tablet = engine.tablet_manager().get_tablet(info)?;
        println!("    tablet {info} versions = {}", tablet.version_count());
    }
    Ok(())
}
