//! Compaction 单元的元数据：RowSetEntity / VersionEntity
//!
//! VersionEntity 的二进制格式（小端）：
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ start (i64) │ end (i64) │ version_hash   │
//! │ num_rowsets (u32)                        │
//! │   rowset_id (i32) num_segments (i32)     │
//! │   num_rows (i64) data_size (u64)         │
//! │   index_size (u64) empty (u8)            │
//! │   num_key_ranges (u32)                   │
//! │     min Value │ max Value                │ ← tag (u8) + payload
//! ├──────────────────────────────────────────┤
//! │ CRC32 of everything above (u32)          │
//! └──────────────────────────────────────────┘
//! ```

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::common::{OlapError, Result, RowsetId, Version, VersionHash};
use crate::field_type::Value;

// ── KeyRange ──────────────────────────────────────────────────────────────────

/// 单列的 [min, max] 统计，值语义，随 RowSetEntity 一起复制
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    pub min: Value,
    pub max: Value,
}

impl KeyRange {
    pub fn new(min: Value, max: Value) -> Self { Self { min, max } }

    pub fn contains(&self, v: &Value) -> bool {
        matches!(self.min.partial_cmp(v), Some(o) if o.is_le())
            && matches!(v.partial_cmp(&self.max), Some(o) if o.is_le())
    }

    /// 两个区间是否可能有交集；不可比较时保守地返回 true
    pub fn overlaps(&self, other: &KeyRange) -> bool {
        let disjoint = matches!(self.max.partial_cmp(&other.min), Some(o) if o.is_lt())
            || matches!(other.max.partial_cmp(&self.min), Some(o) if o.is_lt());
        !disjoint
    }
}

// ── RowSetEntity ──────────────────────────────────────────────────────────────

/// 一个物理 rowset 的元数据快照，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct RowSetEntity {
    rowset_id:    RowsetId,
    num_segments: i32,
    num_rows:     i64,
    data_size:    u64,
    index_size:   u64,
    empty:        bool,
    key_ranges:   Vec<KeyRange>,
}

impl RowSetEntity {
    /// `column_statistics` 为 None 时 key range 为空序列
    pub fn new(
        rowset_id:         RowsetId,
        num_segments:      i32,
        num_rows:          i64,
        data_size:         u64,
        index_size:        u64,
        empty:             bool,
        column_statistics: Option<&[KeyRange]>,
    ) -> Self {
        Self {
            rowset_id, num_segments, num_rows, data_size, index_size, empty,
            key_ranges: column_statistics.map(<[KeyRange]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn rowset_id(&self) -> RowsetId { self.rowset_id }
    pub fn num_segments(&self) -> i32 { self.num_segments }
    pub fn num_rows(&self) -> i64 { self.num_rows }
    pub fn data_size(&self) -> u64 { self.data_size }
    pub fn index_size(&self) -> u64 { self.index_size }
    pub fn is_empty(&self) -> bool { self.empty }
    pub fn key_ranges(&self) -> &[KeyRange] { &self.key_ranges }

    pub fn total_size(&self) -> u64 { self.data_size.saturating_add(self.index_size) }
}

// ── VersionEntity ─────────────────────────────────────────────────────────────

/// 同一 Version 下的全部 rowset，以及标识该版本合并状态的 VersionHash
///
/// RowSetEntity 本身不携带版本号，只能通过 `add_rowset_entity` 挂到某个
/// VersionEntity 下，因此 `rowset_vec` 中不会出现其它版本的 rowset。
#[derive(Debug, Clone, PartialEq)]
pub struct VersionEntity {
    pub version:      Version,
    pub version_hash: VersionHash,
    rowset_vec:       Vec<RowSetEntity>,
}

impl VersionEntity {
    pub fn new(version: Version, version_hash: VersionHash) -> Self {
        Self { version, version_hash, rowset_vec: Vec::new() }
    }

    /// 追加到末尾，保持插入顺序，不去重
    pub fn add_rowset_entity(&mut self, rowset: RowSetEntity) {
        self.rowset_vec.push(rowset);
    }

    pub fn rowset_vec(&self) -> &[RowSetEntity] { &self.rowset_vec }

    pub fn num_rows(&self) -> i64 {
        self.rowset_vec.iter().map(RowSetEntity::num_rows).sum()
    }

    pub fn data_size(&self) -> u64 {
        self.rowset_vec.iter().map(RowSetEntity::data_size).sum()
    }

    pub fn num_segments(&self) -> i64 {
        self.rowset_vec.iter().map(|r| r.num_segments as i64).sum()
    }

    // ── 序列化 ────────────────────────────────────────────────────────────────

    /// 计数超出 u32 时返回 `TooLarge`，不做截断
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        let crc = crc32fast::hash(&out);
        out.write_u32::<LittleEndian>(crc)?;
        Ok(out)
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_i64::<LittleEndian>(self.version.start)?;
        out.write_i64::<LittleEndian>(self.version.end)?;
        out.write_i64::<LittleEndian>(self.version_hash)?;
        out.write_u32::<LittleEndian>(encoded_len("rowset", self.rowset_vec.len())?)?;
        for rs in &self.rowset_vec {
            out.write_i32::<LittleEndian>(rs.rowset_id)?;
            out.write_i32::<LittleEndian>(rs.num_segments)?;
            out.write_i64::<LittleEndian>(rs.num_rows)?;
            out.write_u64::<LittleEndian>(rs.data_size)?;
            out.write_u64::<LittleEndian>(rs.index_size)?;
            out.write_u8(rs.empty as u8)?;
            out.write_u32::<LittleEndian>(encoded_len("key range", rs.key_ranges.len())?)?;
            for kr in &rs.key_ranges {
                write_value(out, &kr.min)?;
                write_value(out, &kr.max)?;
            }
        }
        Ok(())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(OlapError::Corruption("version entity too short".into()));
        }
        let (body, crc_bytes) = data.split_at(data.len() - 4);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if crc32fast::hash(body) != expected {
            return Err(OlapError::ChecksumMismatch);
        }

        let mut cur = Cursor::new(body);
        let entity = Self::decode_body(&mut cur).map_err(|e| OlapError::Corruption(e.to_string()))?;
        if cur.position() as usize != body.len() {
            return Err(OlapError::Corruption("trailing bytes after version entity".into()));
        }
        Ok(entity)
    }

    fn decode_body(cur: &mut Cursor<&[u8]>) -> std::io::Result<Self> {
        let start        = cur.read_i64::<LittleEndian>()?;
        let end          = cur.read_i64::<LittleEndian>()?;
        let version_hash = cur.read_i64::<LittleEndian>()?;
        let mut entity   = Self::new(Version::new(start, end), version_hash);

        let n = cur.read_u32::<LittleEndian>()?;
        for _ in 0..n {
            let rowset_id    = cur.read_i32::<LittleEndian>()?;
            let num_segments = cur.read_i32::<LittleEndian>()?;
            let num_rows     = cur.read_i64::<LittleEndian>()?;
            let data_size    = cur.read_u64::<LittleEndian>()?;
            let index_size   = cur.read_u64::<LittleEndian>()?;
            let empty        = cur.read_u8()? != 0;
            let n_ranges     = cur.read_u32::<LittleEndian>()?;
            let mut key_ranges = Vec::new();
            for _ in 0..n_ranges {
                let min = read_value(cur)?;
                let max = read_value(cur)?;
                key_ranges.push(KeyRange::new(min, max));
            }
            entity.add_rowset_entity(RowSetEntity {
                rowset_id, num_segments, num_rows, data_size, index_size, empty, key_ranges,
            });
        }
        Ok(entity)
    }
}

// ── Value 编码 ────────────────────────────────────────────────────────────────

const TAG_NULL:  u8 = 0;
const TAG_I8:    u8 = 1;
const TAG_I16:   u8 = 2;
const TAG_I32:   u8 = 3;
const TAG_I64:   u8 = 4;
const TAG_F32:   u8 = 5;
const TAG_F64:   u8 = 6;
const TAG_BYTES: u8 = 7;

fn encoded_len(what: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| OlapError::TooLarge { what, len })
}

fn write_value(out: &mut Vec<u8>, v: &Value) -> Result<()> {
    match v {
        Value::Null       => out.write_u8(TAG_NULL)?,
        Value::Int8(x)    => { out.write_u8(TAG_I8)?;  out.write_i8(*x)? }
        Value::Int16(x)   => { out.write_u8(TAG_I16)?; out.write_i16::<LittleEndian>(*x)? }
        Value::Int32(x)   => { out.write_u8(TAG_I32)?; out.write_i32::<LittleEndian>(*x)? }
        Value::Int64(x)   => { out.write_u8(TAG_I64)?; out.write_i64::<LittleEndian>(*x)? }
        Value::Float32(x) => { out.write_u8(TAG_F32)?; out.write_f32::<LittleEndian>(*x)? }
        Value::Float64(x) => { out.write_u8(TAG_F64)?; out.write_f64::<LittleEndian>(*x)? }
        Value::Bytes(b)   => {
            out.write_u8(TAG_BYTES)?;
            out.write_u32::<LittleEndian>(encoded_len("value byte", b.len())?)?;
            out.extend_from_slice(b);
        }
    }
    Ok(())
}

fn read_value(cur: &mut Cursor<&[u8]>) -> std::io::Result<Value> {
    let v = match cur.read_u8()? {
        TAG_NULL  => Value::Null,
        TAG_I8    => Value::Int8(cur.read_i8()?),
        TAG_I16   => Value::Int16(cur.read_i16::<LittleEndian>()?),
        TAG_I32   => Value::Int32(cur.read_i32::<LittleEndian>()?),
        TAG_I64   => Value::Int64(cur.read_i64::<LittleEndian>()?),
        TAG_F32   => Value::Float32(cur.read_f32::<LittleEndian>()?),
        TAG_F64   => Value::Float64(cur.read_f64::<LittleEndian>()?),
        TAG_BYTES => {
            let len = cur.read_u32::<LittleEndian>()? as usize;
            let remaining = cur.get_ref().len().saturating_sub(cur.position() as usize);
            if len > remaining {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            let mut buf = vec![0u8; len];
            cur.read_exact(&mut buf)?;
            Value::Bytes(buf)
        }
        tag => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown value tag {tag}"),
            ))
        }
    };
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rowset(id: RowsetId) -> RowSetEntity {
        RowSetEntity::new(id, 1, 100 * id as i64, 4096, 128, false, None)
    }

    #[test]
    fn add_rowset_entity_preserves_order_without_dedup() {
        let mut ve = VersionEntity::new(Version::new(100, 110), 0x5eed);
        let (r1, r2, r3) = (rowset(1), rowset(2), rowset(3));
        ve.add_rowset_entity(r1.clone());
        ve.add_rowset_entity(r2.clone());
        ve.add_rowset_entity(r3.clone());
        assert_eq!(ve.rowset_vec(), &[r1.clone(), r2, r3][..]);

        ve.add_rowset_entity(r1);
        assert_eq!(ve.rowset_vec().len(), 4);
        assert_eq!(ve.rowset_vec()[3].rowset_id(), 1);
        assert_eq!(ve.num_rows(), 100 + 200 + 300 + 100);
    }

    #[test]
    fn rowset_without_column_statistics_has_no_key_ranges() {
        let rs = RowSetEntity::new(7, 2, 10, 1, 1, true, None);
        assert!(rs.key_ranges().is_empty());
        assert!(rs.is_empty());
    }

    #[test]
    fn rowset_keeps_column_statistics_verbatim() {
        let stats = vec![
            KeyRange::new(Value::Int32(1), Value::Int32(99)),
            KeyRange::new(Value::Bytes(b"a".to_vec()), Value::Bytes(b"z".to_vec())),
        ];
        let rs = RowSetEntity::new(7, 2, 10, 1, 1, false, Some(&stats));
        assert_eq!(rs.key_ranges().len(), 2);
        assert_eq!(rs.key_ranges(), &stats[..]);
    }

    #[test]
    fn key_range_pruning() {
        let kr = KeyRange::new(Value::Int64(10), Value::Int64(20));
        assert!(kr.contains(&Value::Int32(10)));
        assert!(!kr.contains(&Value::Int64(21)));
        assert!(kr.overlaps(&KeyRange::new(Value::Int64(20), Value::Int64(30))));
        assert!(!kr.overlaps(&KeyRange::new(Value::Int64(21), Value::Int64(30))));
    }

    #[test]
    fn codec_restores_entity() {
        let stats = vec![KeyRange::new(Value::Null, Value::Bytes(b"zz".to_vec()))];
        let mut ve = VersionEntity::new(Version::new(0, 5), -42);
        ve.add_rowset_entity(RowSetEntity::new(1, 3, 300, 9000, 100, false, Some(&stats)));
        ve.add_rowset_entity(RowSetEntity::new(2, 0, 0, 0, 0, true, None));

        let decoded = VersionEntity::decode(&ve.encode().unwrap()).unwrap();
        assert_eq!(decoded, ve);
    }

    #[test]
    fn codec_detects_corruption() {
        let mut ve = VersionEntity::new(Version::new(0, 5), 1);
        ve.add_rowset_entity(rowset(1));
        let mut buf = ve.encode().unwrap();
        buf[3] ^= 0xff;
        assert!(matches!(VersionEntity::decode(&buf), Err(OlapError::ChecksumMismatch)));
        assert!(matches!(VersionEntity::decode(&[1, 2]), Err(OlapError::Corruption(_))));
    }

    #[test]
    fn counts_beyond_u32_are_rejected_not_truncated() {
        assert_eq!(encoded_len("rowset", 3).unwrap(), 3);
        assert_eq!(encoded_len("rowset", u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            encoded_len("key range", u32::MAX as usize + 1),
            Err(OlapError::TooLarge { what: "key range", .. })
        ));
    }
}
