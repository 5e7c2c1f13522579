//! Tablet 运行时状态（Version Graph + Tablet 句柄 + TabletManager）

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{OlapError, Result, TabletId, TabletInfo, Version, Versions};
use crate::field_type::CompactionType;
use crate::meta::VersionEntity;

// ── Version 图 ────────────────────────────────────────────────────────────────
//
// 有向图：每条边 start → end 代表一个覆盖 [start,end] 的 VersionEntity。
// 支持：
//   • 检测版本空洞
//   • 找出覆盖 [lo,hi] 的最少版本集合

#[derive(Debug, Default)]
pub struct VersionGraph {
    // start_version → { end_version, ... }
    adj: HashMap<i64, HashSet<i64>>,
}

impl VersionGraph {
    pub fn add_edge(&mut self, v: Version) {
        self.adj.entry(v.start).or_default().insert(v.end);
    }

    pub fn remove_edge(&mut self, v: Version) {
        if let Some(ends) = self.adj.get_mut(&v.start) {
            ends.remove(&v.end);
            if ends.is_empty() {
                self.adj.remove(&v.start);
            }
        }
    }

    /// BFS 找从 lo 到 hi 的覆盖路径，返回经过的 Version 列表。
    pub fn find_covering_path(&self, lo: i64, hi: i64) -> Option<Versions> {
        let mut queue: VecDeque<(i64, Versions)> = VecDeque::new();
        queue.push_back((lo, vec![]));
        let mut visited: HashSet<i64> = HashSet::new();
        visited.insert(lo);

        while let Some((cur, path)) = queue.pop_front() {
            let Some(ends) = self.adj.get(&cur) else { continue };
            // 优先尝试跨度最大的边
            let mut sorted: Vec<i64> = ends.iter().copied().collect();
            sorted.sort_unstable_by(|a, b| b.cmp(a));

            for end in sorted {
                let mut new_path = path.clone();
                new_path.push(Version::new(cur, end));

                if end == hi {
                    return Some(new_path);
                }
                if end < hi && visited.insert(end + 1) {
                    queue.push_back((end + 1, new_path));
                }
            }
        }
        None
    }

    pub fn has_version_holes(&self, lo: i64, hi: i64) -> bool {
        self.find_covering_path(lo, hi).is_none()
    }
}

// ── Tablet 内部状态 ───────────────────────────────────────────────────────────

struct TabletInner {
    versions:               BTreeMap<Version, VersionEntity>,
    version_graph:          VersionGraph,
    /// cumulative compaction 分界点：end <= 该值的版本归 base compaction 处理
    cumulative_layer_point: i64,
}

// ── Tablet 句柄 ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Tablet {
    info:  TabletInfo,
    inner: Arc<RwLock<TabletInner>>,
}

impl Tablet {
    pub fn new(info: TabletInfo) -> Self {
        Self {
            info,
            inner: Arc::new(RwLock::new(TabletInner {
                versions:               BTreeMap::new(),
                version_graph:          VersionGraph::default(),
                cumulative_layer_point: -1,
            })),
        }
    }

    pub fn info(&self) -> TabletInfo { self.info }

    pub fn max_version(&self) -> Option<Version> {
        self.inner.read().versions.keys().max_by_key(|v| v.end).copied()
    }

    pub fn version_count(&self) -> usize {
        self.inner.read().versions.len()
    }

    pub fn cumulative_layer_point(&self) -> i64 {
        self.inner.read().cumulative_layer_point
    }

    pub fn set_cumulative_layer_point(&self, point: i64) {
        self.inner.write().cumulative_layer_point = point;
    }

    /// 发布一个新版本
    pub fn add_version(&self, entity: VersionEntity) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.versions.contains_key(&entity.version) {
            return Err(OlapError::VersionExists(entity.version));
        }
        inner.version_graph.add_edge(entity.version);
        inner.versions.insert(entity.version, entity);
        Ok(())
    }

    /// 删除一个版本（compaction 产出新版本后调用），返回被删除的实体
    pub fn remove_version(&self, version: Version) -> Option<VersionEntity> {
        let mut inner = self.inner.write();
        let removed = inner.versions.remove(&version)?;
        inner.version_graph.remove_edge(version);
        Some(removed)
    }

    /// 找出覆盖 [lo, hi] 版本范围的最少 VersionEntity 集合
    pub fn capture_consistent_versions(&self, lo: i64, hi: i64) -> Result<Vec<VersionEntity>> {
        let inner = self.inner.read();
        let path = inner.version_graph
            .find_covering_path(lo, hi)
            .ok_or_else(|| OlapError::MissingVersions(format!("[{lo},{hi}]")))?;

        Ok(path.iter().filter_map(|v| inner.versions.get(v).cloned()).collect())
    }

    /// Compaction 优先级得分：该层待合并的 rowset 数量
    pub fn compaction_score(&self, ctype: CompactionType) -> usize {
        let inner = self.inner.read();
        let point = inner.cumulative_layer_point;
        inner.versions.values()
            .filter(|ve| match ctype {
                CompactionType::Base       => ve.version.end <= point,
                CompactionType::Cumulative => ve.version.end > point,
            })
            .map(|ve| ve.rowset_vec().len())
            .sum()
    }
}

// ── Tablet 分片注册表 ─────────────────────────────────────────────────────────

const NUM_SHARDS: usize = 64;

type Shard = HashMap<TabletInfo, Tablet>;

/// 分片 Tablet 注册表
///
/// 使用 64 个 RwLock Shard 降低读写竞争。
pub struct TabletManager {
    shards: Vec<RwLock<Shard>>,
}

impl TabletManager {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| RwLock::new(Shard::new())).collect();
        Self { shards }
    }

    fn shard(&self, tablet_id: TabletId) -> &RwLock<Shard> {
        &self.shards[(tablet_id.unsigned_abs() as usize) % NUM_SHARDS]
    }

    pub fn create_tablet(&self, info: TabletInfo) -> Result<Tablet> {
        let mut shard = self.shard(info.tablet_id).write();
        if shard.contains_key(&info) {
            return Err(OlapError::TabletExists(info));
        }
        let tablet = Tablet::new(info);
        shard.insert(info, tablet.clone());
        Ok(tablet)
    }

    pub fn get_tablet(&self, info: TabletInfo) -> Result<Tablet> {
        self.shard(info.tablet_id)
            .read()
            .get(&info)
            .cloned()
            .ok_or(OlapError::TabletNotFound(info))
    }

    pub fn drop_tablet(&self, info: TabletInfo) -> Result<()> {
        self.shard(info.tablet_id)
            .write()
            .remove(&info)
            .map(|_| ())
            .ok_or(OlapError::TabletNotFound(info))
    }

    pub fn tablet_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// 全部 tablet，按 TabletInfo 排序
    pub fn tablet_infos(&self) -> Vec<TabletInfo> {
        let mut infos: Vec<TabletInfo> = self.shards.iter()
            .flat_map(|s| s.read().keys().copied().collect::<Vec<_>>())
            .collect();
        infos.sort_unstable();
        infos
    }

    /// 按得分从高到低返回 (TabletInfo, score)，跳过无事可做（得分 < 2）的 tablet
    pub fn collect_compaction_candidates(&self, ctype: CompactionType) -> Vec<(TabletInfo, usize)> {
        let mut result = Vec::new();
        for shard in &self.shards {
            let guard = shard.read();
            for (info, tablet) in guard.iter() {
                let score = tablet.compaction_score(ctype);
                if score >= 2 {
                    result.push((*info, score));
                }
            }
        }
        result.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        result
    }
}

impl Default for TabletManager {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::RowSetEntity;

    fn entity(start: i64, end: i64, rowsets: i32) -> VersionEntity {
        let mut ve = VersionEntity::new(Version::new(start, end), start ^ end);
        for id in 0..rowsets {
            ve.add_rowset_entity(RowSetEntity::new(id, 1, 10, 100, 10, false, None));
        }
        ve
    }

    #[test]
    fn covering_path_prefers_widest_edges() {
        let tablet = Tablet::new(TabletInfo::new(1, 1));
        tablet.add_version(entity(0, 5, 1)).unwrap();
        tablet.add_version(entity(0, 2, 1)).unwrap();
        tablet.add_version(entity(3, 5, 1)).unwrap();
        tablet.add_version(entity(6, 6, 1)).unwrap();

        let got: Vec<Version> = tablet.capture_consistent_versions(0, 6).unwrap()
            .into_iter().map(|ve| ve.version).collect();
        assert_eq!(got, vec![Version::new(0, 5), Version::new(6, 6)]);
    }

    #[test]
    fn hole_is_reported() {
        let tablet = Tablet::new(TabletInfo::new(1, 1));
        tablet.add_version(entity(0, 2, 1)).unwrap();
        tablet.add_version(entity(4, 5, 1)).unwrap();
        assert!(matches!(
            tablet.capture_consistent_versions(0, 5),
            Err(OlapError::MissingVersions(_))
        ));
        tablet.add_version(entity(3, 3, 1)).unwrap();
        assert!(tablet.capture_consistent_versions(0, 5).is_ok());
        assert!(tablet.remove_version(Version::new(3, 3)).is_some());
        assert!(tablet.capture_consistent_versions(0, 5).is_err());
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let tablet = Tablet::new(TabletInfo::new(1, 1));
        tablet.add_version(entity(0, 1, 1)).unwrap();
        assert!(matches!(tablet.add_version(entity(0, 1, 2)), Err(OlapError::VersionExists(_))));
    }

    #[test]
    fn compaction_score_splits_on_layer_point() {
        let tablet = Tablet::new(TabletInfo::new(1, 1));
        tablet.add_version(entity(0, 10, 3)).unwrap();
        tablet.add_version(entity(11, 11, 2)).unwrap();
        tablet.add_version(entity(12, 12, 1)).unwrap();
        tablet.set_cumulative_layer_point(10);
        assert_eq!(tablet.compaction_score(CompactionType::Base), 3);
        assert_eq!(tablet.compaction_score(CompactionType::Cumulative), 3);
        assert_eq!(tablet.max_version(), Some(Version::new(12, 12)));
    }

    #[test]
    fn manager_registers_and_ranks_tablets() {
        let mgr = TabletManager::new();
        let a = mgr.create_tablet(TabletInfo::new(65, 1)).unwrap();
        let b = mgr.create_tablet(TabletInfo::new(1, 1)).unwrap();
        mgr.create_tablet(TabletInfo::new(1, 2)).unwrap();
        assert!(matches!(
            mgr.create_tablet(TabletInfo::new(1, 1)),
            Err(OlapError::TabletExists(_))
        ));

        a.add_version(entity(0, 0, 4)).unwrap();
        b.add_version(entity(0, 0, 2)).unwrap();

        let ranked = mgr.collect_compaction_candidates(CompactionType::Cumulative);
        assert_eq!(ranked, vec![(TabletInfo::new(65, 1), 4), (TabletInfo::new(1, 1), 2)]);
        assert_eq!(
            mgr.tablet_infos(),
            vec![TabletInfo::new(1, 1), TabletInfo::new(1, 2), TabletInfo::new(65, 1)]
        );

        mgr.drop_tablet(TabletInfo::new(1, 2)).unwrap();
        assert_eq!(mgr.tablet_count(), 2);
        assert!(mgr.get_tablet(TabletInfo::new(1, 2)).is_err());
    }
}
