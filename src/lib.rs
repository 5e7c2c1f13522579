//! # olap-bg-worker
//!
//! OLAP 存储引擎的后台维护子系统：一组常驻线程在不阻塞前台读写的前提下
//! 维持 tablet 存储的健康状态。
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        StorageEngine                         │
//! │  TabletManager   SchemaChangeCounter   EngineConfig          │
//! │        │                                   │ validated()     │
//! │        │                             WorkerSettings          │
//! │        ▼                                   ▼                 │
//! │  start_bg_workers() ── ShutdownSignal ──► 每个任务一个线程    │
//! │   ├─ garbage-sweeper     (间隔随磁盘使用率自适应)            │
//! │   ├─ disk-stat-monitor                                       │
//! │   ├─ unused-index-cleaner                                    │
//! │   ├─ fd-cache-cleaner                                        │
//! │   ├─ base-compact-{0..N}  ┐ 每轮先加入资源组                 │
//! │   └─ cumu-compact-{0..M}  ┘                                  │
//! │                │                                             │
//! │                ▼                                             │
//! │        StorageMaintenance（外部协作者：compaction / trash     │
//! │        清理 / 磁盘巡检 / 索引与 FD cache 清理）              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

// ── 数据模型 ──────────────────────────────────────────────────────────────────
pub mod common;
pub mod field_type;
pub mod meta;
pub mod stats;
pub mod compression;
pub mod tablet;

// ── 后台调度 ──────────────────────────────────────────────────────────────────
pub mod config;
pub mod interval;
pub mod worker;
pub mod collaborator;
pub mod sweep;
pub mod compaction;
pub mod storage;

pub use common::{OlapError, Result, TabletInfo, Version, Versions};
pub use config::EngineConfig;
pub use storage::StorageEngine;
