//! 全局基础类型与错误定义

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

pub type TabletId    = i64;
pub type SchemaHash  = i32;
pub type VersionHash = i64;
pub type RowsetId    = i32;
pub type ColumnId    = u32;

/// 列 unique id 集合
pub type UniqueIdSet = BTreeSet<u32>;
/// 列 unique id → column id
pub type UniqueIdToColumnIdMap = BTreeMap<ColumnId, ColumnId>;

// ── TabletInfo ────────────────────────────────────────────────────────────────

/// 引擎内唯一标识一个 Tablet：(tablet_id, schema_hash)
///
/// 排序先比较 `tablet_id`，相同时再比较 `schema_hash`，
/// 字段声明顺序即比较顺序，derive 出的 `Ord` 与 `Eq` 一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TabletInfo {
    pub tablet_id:   TabletId,
    pub schema_hash: SchemaHash,
}

impl TabletInfo {
    pub fn new(tablet_id: TabletId, schema_hash: SchemaHash) -> Self {
        Self { tablet_id, schema_hash }
    }
}

/// 形如 `.10001.368169781`，用于拼接 trash / snapshot 目录名
impl fmt::Display for TabletInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}.{}", self.tablet_id, self.schema_hash)
    }
}

// ── Version ───────────────────────────────────────────────────────────────────

/// 一个 Rowset 覆盖的 [start, end] 版本范围，例如 [100, 110]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub start: i64,
    pub end:   i64,
}

impl Version {
    pub fn new(start: i64, end: i64) -> Self { Self { start, end } }
    pub fn point(v: i64) -> Self { Self::new(v, v) }

    /// `other` 是否完全落在本区间内
    pub fn contains(&self, other: &Version) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// `next` 是否紧接在本区间之后
    pub fn is_adjacent_to(&self, next: &Version) -> bool {
        self.end + 1 == next.start
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

pub type Versions = Vec<Version>;

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OlapError {
    #[error("tablet not found: {0}")]
    TabletNotFound(TabletInfo),
    #[error("tablet already exists: {0}")]
    TabletExists(TabletInfo),
    #[error("version already exists: {0}")]
    VersionExists(Version),
    #[error("missing versions in range {0}")]
    MissingVersions(String),
    #[error("invalid {kind} code: {code}")]
    InvalidEnumCode { kind: &'static str, code: i32 },
    #[error("compression error: {0}")]
    Compression(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("corrupted metadata: {0}")]
    Corruption(String),
    #[error("{what} count {len} does not fit the metadata format")]
    TooLarge { what: &'static str, len: usize },
    #[error("config error: {0}")]
    Config(String),
    #[error("background workers already started")]
    AlreadyStarted,
    #[error("failed to spawn worker thread `{name}`: {source}")]
    Spawn {
        name:   String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// 外部协作者（compaction / trash sweep / 磁盘巡检等）报告的失败
    #[error("{op} failed: {reason}")]
    Collaborator { op: &'static str, reason: String },
}

impl OlapError {
    pub fn collaborator(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Collaborator { op, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, OlapError>;
