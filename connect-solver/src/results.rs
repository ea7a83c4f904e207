//! Results file for resumable autoplay runs.
//!
//! Binary format:
//! - Header (32 bytes):
//!   - magic: [u8; 4] = "MCR1"
//!   - version: u32
//!   - count: u64
//!   - checksum: u64 (xxh64 of data section)
//!   - reserved: [u8; 8]
//! - Data section (count * 24 bytes):
//!   - seed: u64, score: u64, max_tile: u32, merges: u32

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use xxhash_rust::xxh64::xxh64;

use crate::policy::GameRecord;

const MAGIC: &[u8; 4] = b"MCR1";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;
const RECORD_SIZE: usize = 24;

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// Finished games, ordered by seed.
#[derive(Debug, Default)]
pub struct Results {
    pub records: Vec<GameRecord>,
}

impl Results {
    /// Seed to play next: one past the highest recorded seed, or `start`
    /// when nothing at or above `start` is recorded yet.
    pub fn next_seed(&self, start: u64) -> u64 {
        self.records
            .iter()
            .map(|r| r.seed)
            .filter(|&seed| seed >= start)
            .max()
            .map_or(start, |seed| seed.wrapping_add(1))
    }

    /// Save records to file, sorted by seed. Returns the number written.
    pub fn save(path: &Path, records: &[GameRecord]) -> io::Result<usize> {
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.seed);

        let mut data = Vec::with_capacity(sorted.len() * RECORD_SIZE);
        for record in &sorted {
            data.extend_from_slice(&record.seed.to_le_bytes());
            data.extend_from_slice(&record.score.to_le_bytes());
            data.extend_from_slice(&record.max_tile.to_le_bytes());
            data.extend_from_slice(&record.merges.to_le_bytes());
        }
        let checksum = xxh64(&data, 0);

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(MAGIC);
        header[4..8].copy_from_slice(&VERSION.to_le_bytes());
        header[8..16].copy_from_slice(&(sorted.len() as u64).to_le_bytes());
        header[16..24].copy_from_slice(&checksum.to_le_bytes());

        // Write to a sibling temp file, then rename over the target.
        let temp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            writer.write_all(&header)?;
            writer.write_all(&data)?;
            writer.flush()?;
        }
        std::fs::rename(&temp_path, path)?;

        Ok(sorted.len())
    }

    /// Load records from file, verifying magic, version and checksum.
    pub fn load(path: &Path) -> io::Result<Results> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(invalid("Invalid results magic".to_string()));
        }

        let version = le_u32(&header[4..8]);
        if version != VERSION {
            return Err(invalid(format!("Unsupported results version: {}", version)));
        }

        let count = le_u64(&header[8..16]);
        let stored_checksum = le_u64(&header[16..24]);

        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        if data.len() as u64 != count.saturating_mul(RECORD_SIZE as u64) {
            return Err(invalid(format!(
                "Results file holds {} bytes of records, header says {}",
                data.len(),
                count
            )));
        }

        if xxh64(&data, 0) != stored_checksum {
            return Err(invalid("Results checksum mismatch".to_string()));
        }

        let records = data
            .chunks_exact(RECORD_SIZE)
            .map(|chunk| GameRecord {
                seed: le_u64(&chunk[0..8]),
                score: le_u64(&chunk[8..16]),
                max_tile: le_u32(&chunk[16..20]),
                merges: le_u32(&chunk[20..24]),
            })
            .collect();

        Ok(Results { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<GameRecord> {
        vec![
            GameRecord { seed: 7, score: 1_234, max_tile: 256, merges: 88 },
            GameRecord { seed: 2, score: 96, max_tile: 32, merges: 11 },
            GameRecord { seed: u64::MAX, score: u64::MAX, max_tile: 1 << 31, merges: u32::MAX },
        ]
    }

    #[test]
    fn test_results_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.bin");

        let saved = Results::save(&path, &sample()).unwrap();
        assert_eq!(saved, 3);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len() as usize,
            HEADER_SIZE + 3 * RECORD_SIZE
        );

        let loaded = Results::load(&path).unwrap();
        let seeds: Vec<u64> = loaded.records.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![2, 7, u64::MAX]);
        assert_eq!(loaded.records[1], sample()[0]);
        assert_eq!(loaded.records[2], sample()[2]);
    }

    #[test]
    fn test_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        assert_eq!(Results::save(&path, &[]).unwrap(), 0);
        assert!(Results::load(&path).unwrap().records.is_empty());
    }

    #[test]
    fn test_corrupted_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.bin");
        Results::save(&path, &sample()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_SIZE + 9] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let err = Results::load(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_bad_magic_and_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.bin");
        Results::save(&path, &sample()).unwrap();
        let bytes = std::fs::read(&path).unwrap();

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        std::fs::write(&path, &wrong_magic).unwrap();
        assert_eq!(Results::load(&path).unwrap_err().kind(), io::ErrorKind::InvalidData);

        std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(Results::load(&path).unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_next_seed() {
        let results = Results { records: sample()[..2].to_vec() };
        assert_eq!(results.next_seed(0), 8);
        assert_eq!(results.next_seed(100), 100);
        assert_eq!(Results::default().next_seed(5), 5);
    }
}
