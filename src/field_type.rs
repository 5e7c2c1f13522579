//! 字段类型与各类稳定枚举
//!
//! 这里的整数取值同时出现在 tablet 元数据文件和 FE/BE 之间的消息中，
//! 属于持久化协议的一部分：**只能追加，不能重新编号**。

use std::cmp::Ordering;

use crate::common::{OlapError, Result};

/// 为 `#[repr(i32)]` 枚举生成 `code()` 与 `TryFrom<i32>`
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $code ),+
        }

        impl $name {
            pub fn code(self) -> i32 { self as i32 }
        }

        impl TryFrom<i32> for $name {
            type Error = OlapError;

            fn try_from(code: i32) -> Result<Self> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    _ => Err(OlapError::InvalidEnumCode { kind: stringify!($name), code }),
                }
            }
        }
    };
}

wire_enum! {
    /// Field 支持的全部存储类型
    pub enum FieldType {
        TinyInt          = 1,
        UnsignedTinyInt  = 2,
        SmallInt         = 3,
        UnsignedSmallInt = 4,
        Int              = 5,
        UnsignedInt      = 6,
        BigInt           = 7,
        UnsignedBigInt   = 8,
        LargeInt         = 9,
        Float            = 10,
        Double           = 11,
        DiscreteDouble   = 12,
        Char             = 13,
        Date             = 14,
        DateTime         = 15,
        /// 与 MySQL 存储格式不同的定点数
        Decimal          = 16,
        Varchar          = 17,
        Struct           = 18,
        List             = 19,
        Map              = 20,
        Unknown          = 21,
        None             = 22,
        Hll              = 23,
    }
}

impl FieldType {
    /// 固定字节宽度；变长或复合类型返回 None
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::TinyInt | Self::UnsignedTinyInt   => Some(1),
            Self::SmallInt | Self::UnsignedSmallInt => Some(2),
            Self::Int | Self::UnsignedInt | Self::Float => Some(4),
            Self::Date                              => Some(3),
            Self::BigInt | Self::UnsignedBigInt
            | Self::Double | Self::DiscreteDouble
            | Self::DateTime                        => Some(8),
            Self::LargeInt                          => Some(16),
            Self::Decimal                           => Some(12),
            _                                       => None,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::Char | Self::Varchar | Self::Hll)
    }
}

wire_enum! {
    /// Field 支持的聚合方法
    ///
    /// 并非所有类型都适用全部聚合方法（例如对字符串做 SUM 没有意义），
    /// 这类约束在建表时检查，见 [`FieldAggregationMethod::applies_to`]。
    pub enum FieldAggregationMethod {
        None     = 0,
        Sum      = 1,
        Min      = 2,
        Max      = 3,
        Replace  = 4,
        HllUnion = 5,
        Unknown  = 6,
    }
}

impl FieldAggregationMethod {
    pub fn applies_to(self, field_type: FieldType) -> bool {
        match self {
            Self::None | Self::Replace  => true,
            Self::Min | Self::Max       => field_type != FieldType::Hll,
            Self::Sum                   => !field_type.is_string() && field_type.fixed_size().is_some(),
            Self::HllUnion              => field_type == FieldType::Hll,
            Self::Unknown               => false,
        }
    }
}

wire_enum! {
    /// 压缩算法类别
    pub enum CompressionType {
        /// 网络传输用：压缩率低，CPU 开销低
        Transport = 1,
        /// 磁盘存储用：压缩率高，CPU 开销大
        Storage   = 2,
        /// 存储用：压缩率低，CPU 开销低
        Lz4       = 3,
    }
}

wire_enum! {
    /// HLL 数据存储格式
    pub enum HllDataType {
        /// 空集合
        Empty    = 0,
        /// 直接存储 hash 结果
        Explicit = 1,
        /// 只记录非空 register
        Sparse   = 2,
        /// 完整的 register 数组
        Full     = 3,
        None     = 4,
    }
}

wire_enum! {
    pub enum AlterTabletType {
        /// add / drop / alter column
        SchemaChange      = 1,
        CreateRollupTable = 2,
    }
}

wire_enum! {
    pub enum AlterTableStatus {
        Waiting  = 0,
        Running  = 1,
        Finished = 2,
        Failed   = 3,
    }
}

wire_enum! {
    /// 导入（push）类型
    pub enum PushType {
        Normal        = 1,
        ForDelete     = 2,
        ForLoadDelete = 3,
    }
}

wire_enum! {
    /// Reader 的用途，决定聚合 / 删除条件的处理方式
    pub enum ReaderType {
        Query                 = 0,
        AlterTable            = 1,
        BaseCompaction        = 2,
        CumulativeCompaction  = 3,
        Checksum              = 4,
    }
}

wire_enum! {
    pub enum RangeCondition {
        /// greater than
        Gt = 0,
        /// greater or equal
        Ge = 1,
        /// less than
        Lt = 2,
        /// less or equal
        Le = 3,
    }
}

wire_enum! {
    /// 一个数据块满足删除条件的程度
    pub enum DelCondSatisfied {
        Satisfied        = 0,
        NotSatisfied     = 1,
        PartialSatisfied = 2,
    }
}

/// 两类后台 compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompactionType { Base, Cumulative }

impl CompactionType {
    pub fn reader_type(self) -> ReaderType {
        match self {
            Self::Base       => ReaderType::BaseCompaction,
            Self::Cumulative => ReaderType::CumulativeCompaction,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Base       => "base",
            Self::Cumulative => "cumulative",
        }
    }
}

// ── 列值 ──────────────────────────────────────────────────────────────────────

/// 列值（运行时表示），用作 key range 的上下界
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(v)  => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self { Self::Bytes(b) => Some(b), _ => None }
    }
    pub fn is_null(&self) -> bool { matches!(self, Self::Null) }
}

/// NULL 小于任何非 NULL 值；整数之间跨宽度比较；
/// 类型不兼容（例如整数与字节串）时不可比较。
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null)       => Some(Ordering::Equal),
            (Self::Null, _)                => Some(Ordering::Less),
            (_, Self::Null)                => Some(Ordering::Greater),
            (Self::Float32(a), Self::Float32(b)) => a.partial_cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.partial_cmp(b),
            (Self::Float32(a), Self::Float64(b)) => (*a as f64).partial_cmp(b),
            (Self::Float64(a), Self::Float32(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Bytes(a), Self::Bytes(b))     => Some(a.cmp(b)),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => None,
            },
        }
    }
}

/// 与 `partial_cmp` 一致：`Int8(3) == Int64(3)`，NaN 与任何值都不相等
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null       => write!(f, "NULL"),
            Self::Int8(v)    => write!(f, "{v}"),
            Self::Int16(v)   => write!(f, "{v}"),
            Self::Int32(v)   => write!(f, "{v}"),
            Self::Int64(v)   => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bytes(b)   => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}
