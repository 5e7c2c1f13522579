//! 从文件加载配置并校验为后台任务参数

use std::io::Write;
use std::time::Duration;

use olap_bg_worker::interval::GarbageSweepBounds;
use olap_bg_worker::{EngineConfig, OlapError};

#[test]
fn loads_and_validates_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "base_compaction_num_threads": 4,
            "cumulative_compaction_num_threads": 2,
            "cumulative_compaction_check_interval_seconds": 0.5,
            "max_garbage_sweep_interval": 100,
            "min_garbage_sweep_interval": 200,
            "disk_stat_monitor_interval": 0
        }}"#
    )
    .unwrap();

    let config = EngineConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.base_compaction_num_threads, 4);
    assert_eq!(config.file_descriptor_cache_clean_interval, 3600);

    let settings = config.validated();
    assert_eq!(settings.base_compaction_threads, 4);
    assert_eq!(settings.cumulative_compaction_threads, 2);
    assert_eq!(settings.cumulative_compaction_interval, Duration::from_millis(500));
    assert_eq!(settings.disk_stat_monitor_interval, Duration::from_secs(1));
    // max < min：min 重置为 1，max 保留
    assert_eq!(settings.garbage_sweep, GarbageSweepBounds { min_secs: 1, max_secs: 100 });
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_json_file(dir.path().join("be.json")).unwrap_err();
    assert!(matches!(err, OlapError::Io(_)));
}

#[test]
fn wrong_value_type_is_a_config_error() {
    let err = EngineConfig::from_json_str(r#"{ "disk_stat_monitor_interval": "often" }"#).unwrap_err();
    assert!(matches!(err, OlapError::Config(_)));
}
