//! 扫描统计（OlapReaderStatistics）
//!
//! 每个 scan / read 操作独占一份，生命周期内只增不减；
//! 因此只暴露 `&mut self` 的累加接口，没有内部可变性，也不实现 `Sync` 共享语义。

use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OlapReaderStatistics {
    pub io_ns:                   u64,
    pub compressed_bytes_read:   u64,

    pub decompress_ns:           u64,
    pub uncompressed_bytes_read: u64,

    pub bytes_read:              u64,

    pub block_load_ns:           u64,
    pub blocks_load:             u64,
    pub block_fetch_ns:          u64,

    pub raw_rows_read:           u64,

    pub rows_vec_cond_filtered:  u64,
    pub vec_cond_ns:             u64,

    pub rows_stats_filtered:     u64,
    pub rows_del_filtered:       u64,

    pub index_load_ns:           u64,
}

impl OlapReaderStatistics {
    pub fn new() -> Self { Self::default() }

    /// 记录一次磁盘读
    pub fn record_io(&mut self, bytes: u64, elapsed_ns: u64) {
        self.io_ns       = self.io_ns.saturating_add(elapsed_ns);
        self.bytes_read  = self.bytes_read.saturating_add(bytes);
    }

    /// 记录一次页解压
    pub fn record_decompress(&mut self, compressed: u64, uncompressed: u64, elapsed_ns: u64) {
        self.compressed_bytes_read   = self.compressed_bytes_read.saturating_add(compressed);
        self.uncompressed_bytes_read = self.uncompressed_bytes_read.saturating_add(uncompressed);
        self.decompress_ns           = self.decompress_ns.saturating_add(elapsed_ns);
    }

    pub fn record_block_load(&mut self, elapsed_ns: u64) {
        self.blocks_load   = self.blocks_load.saturating_add(1);
        self.block_load_ns = self.block_load_ns.saturating_add(elapsed_ns);
    }

    pub fn add_raw_rows(&mut self, rows: u64) {
        self.raw_rows_read = self.raw_rows_read.saturating_add(rows);
    }

    pub fn add_vec_cond_filtered(&mut self, rows: u64, elapsed_ns: u64) {
        self.rows_vec_cond_filtered = self.rows_vec_cond_filtered.saturating_add(rows);
        self.vec_cond_ns            = self.vec_cond_ns.saturating_add(elapsed_ns);
    }

    pub fn add_stats_filtered(&mut self, rows: u64) {
        self.rows_stats_filtered = self.rows_stats_filtered.saturating_add(rows);
    }

    pub fn add_del_filtered(&mut self, rows: u64) {
        self.rows_del_filtered = self.rows_del_filtered.saturating_add(rows);
    }

    /// 执行 `f` 并把耗时（纳秒）累加到 `counter` 选中的计数器上
    ///
    /// ```
    /// use olap_bg_worker::stats::OlapReaderStatistics;
    ///
    /// let mut stats = OlapReaderStatistics::new();
    /// let n = stats.time(|s| &mut s.index_load_ns, || 42);
    /// assert_eq!(n, 42);
    /// ```
    pub fn time<T>(
        &mut self,
        counter: impl FnOnce(&mut Self) -> &mut u64,
        f:       impl FnOnce() -> T,
    ) -> T {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
        let slot = counter(self);
        *slot = slot.saturating_add(elapsed);
        out
    }

    /// 把单个 segment 的统计并入整个 scan 的总量
    pub fn merge(&mut self, other: &OlapReaderStatistics) {
        macro_rules! add {
            ($dst:ident, $src:ident; $($field:ident),+) => {
                $( $dst.$field = $dst.$field.saturating_add($src.$field); )+
            };
        }
        add!(
            self, other;
            io_ns, compressed_bytes_read, decompress_ns, uncompressed_bytes_read,
            bytes_read, block_load_ns, blocks_load, block_fetch_ns, raw_rows_read,
            rows_vec_cond_filtered, vec_cond_ns, rows_stats_filtered,
            rows_del_filtered, index_load_ns
        );
    }

    /// 被任一条件过滤掉的总行数
    pub fn rows_filtered(&self) -> u64 {
        self.rows_vec_cond_filtered
            .saturating_add(self.rows_stats_filtered)
            .saturating_add(self.rows_del_filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_only_accumulate() {
        let mut s = OlapReaderStatistics::new();
        s.record_io(4096, 1_000);
        s.record_io(4096, 500);
        s.record_decompress(100, 400, 7);
        s.record_block_load(3);
        s.add_raw_rows(1024);
        s.add_vec_cond_filtered(10, 1);
        s.add_stats_filtered(20);
        s.add_del_filtered(30);

        assert_eq!(s.bytes_read, 8192);
        assert_eq!(s.io_ns, 1_500);
        assert_eq!(s.uncompressed_bytes_read, 400);
        assert_eq!(s.blocks_load, 1);
        assert_eq!(s.rows_filtered(), 60);
    }

    #[test]
    fn merge_adds_every_counter() {
        let mut a = OlapReaderStatistics { raw_rows_read: 5, index_load_ns: 9, ..Default::default() };
        let b = OlapReaderStatistics { raw_rows_read: 7, block_fetch_ns: 2, ..Default::default() };
        a.merge(&b);
        assert_eq!(a.raw_rows_read, 12);
        assert_eq!(a.block_fetch_ns, 2);
        assert_eq!(a.index_load_ns, 9);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let mut s = OlapReaderStatistics { raw_rows_read: u64::MAX - 1, ..Default::default() };
        s.add_raw_rows(10);
        assert_eq!(s.raw_rows_read, u64::MAX);
    }

    #[test]
    fn time_accumulates_into_selected_counter() {
        let mut s = OlapReaderStatistics::new();
        s.time(|s| &mut s.vec_cond_ns, || std::thread::sleep(std::time::Duration::from_millis(1)));
        assert!(s.vec_cond_ns >= 1_000_000);
        assert_eq!(s.io_ns, 0);
    }
}
