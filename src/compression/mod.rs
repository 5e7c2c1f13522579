//! 压缩/解压（按压缩类别选择 LZ4 模式）
//!
//! 三个类别共用 LZ4 block 格式，差别只在压缩强度，解压路径相同。

use std::time::Instant;

use lz4::block::CompressionMode;

use crate::common::{OlapError, Result};
use crate::field_type::CompressionType;
use crate::stats::OlapReaderStatistics;

fn mode(codec: CompressionType) -> CompressionMode {
    match codec {
        CompressionType::Transport => CompressionMode::FAST(1),
        CompressionType::Storage   => CompressionMode::HIGHCOMPRESSION(9),
        CompressionType::Lz4       => CompressionMode::DEFAULT,
    }
}

pub fn compress(data: &[u8], codec: CompressionType) -> Result<Vec<u8>> {
    lz4::block::compress(data, Some(mode(codec)), false)
        .map_err(|e| OlapError::Compression(e.to_string()))
}

pub fn decompress(data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    let len = i32::try_from(uncompressed_len)
        .map_err(|_| OlapError::Compression(format!("page too large: {uncompressed_len}")))?;
    lz4::block::decompress(data, Some(len))
        .map_err(|e| OlapError::Compression(e.to_string()))
}

/// 解压并把字节数与耗时记入 reader 统计
pub fn decompress_with_stats(
    data:             &[u8],
    uncompressed_len: usize,
    stats:            &mut OlapReaderStatistics,
) -> Result<Vec<u8>> {
    let start = Instant::now();
    let out = decompress(data, uncompressed_len)?;
    stats.record_decompress(
        data.len() as u64,
        out.len() as u64,
        start.elapsed().as_nanos() as u64,
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_decodes_with_the_same_path() {
        let page: Vec<u8> = (0..4096u32).flat_map(|i| (i % 17).to_le_bytes()).collect();
        for codec in [CompressionType::Transport, CompressionType::Storage, CompressionType::Lz4] {
            let packed = compress(&page, codec).unwrap();
            assert!(packed.len() < page.len(), "{codec:?} should shrink a repetitive page");
            assert_eq!(decompress(&packed, page.len()).unwrap(), page);
        }
    }

    #[test]
    fn decompress_updates_reader_stats() {
        let page = vec![7u8; 10_000];
        let packed = compress(&page, CompressionType::Lz4).unwrap();
        let mut stats = OlapReaderStatistics::new();
        decompress_with_stats(&packed, page.len(), &mut stats).unwrap();
        assert_eq!(stats.compressed_bytes_read, packed.len() as u64);
        assert_eq!(stats.uncompressed_bytes_read, 10_000);
    }

    #[test]
    fn garbage_input_is_an_error() {
        assert!(matches!(decompress(&[0xff; 8], 1024), Err(OlapError::Compression(_))));
    }
}
