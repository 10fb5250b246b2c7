//! Write-ahead log for the graph store
//!
//! Each record is a length-prefixed bincode blob holding a sequence number,
//! a [`Mutation`] and a checksum over the mutation bytes. Mutations are
//! logged by key, so replaying them into an empty store rebuilds the same
//! graph regardless of the ids it hands out.

use super::store::Mutation;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// WAL errors
#[derive(Error, Debug)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Checksum mismatch on a complete record
    #[error("WAL corruption detected at sequence {0}")]
    Corruption(u64),
}

pub type WalResult<T> = Result<T, WalError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalRecord {
    sequence: u64,
    mutation: Mutation,
    checksum: u32,
}

impl WalRecord {
    fn new(sequence: u64, mutation: Mutation) -> Self {
        let mut record = Self {
            sequence,
            mutation,
            checksum: 0,
        };
        record.checksum = record.calculate_checksum();
        record
    }

    fn calculate_checksum(&self) -> u32 {
        let bytes = bincode::serialize(&self.mutation).unwrap_or_default();
        bytes
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc.rotate_left(5) ^ (b as u32) ^ (i as u32))
    }

    fn verify_checksum(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }
}

/// Append-only mutation log
pub struct Wal {
    path: PathBuf,
    current_file: Option<BufWriter<File>>,
    sequence: u64,
    /// Flush after every append
    sync_mode: bool,
}

impl Wal {
    /// Open (or create) the WAL directory at `path`
    pub fn new(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        info!("Initializing graph WAL at {:?}", path);

        Ok(Self {
            path,
            current_file: None,
            sequence: 0,
            sync_mode: true,
        })
    }

    pub fn set_sync_mode(&mut self, sync: bool) {
        self.sync_mode = sync;
        debug!("WAL sync mode: {}", sync);
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence
    }

    /// Append a mutation and return its sequence number
    pub fn append(&mut self, mutation: &Mutation) -> WalResult<u64> {
        let sequence = self.sequence + 1;
        let record = WalRecord::new(sequence, mutation.clone());
        let data = bincode::serialize(&record)?;

        if self.current_file.is_none() {
            self.open_new_file(sequence)?;
        }

        if let Some(ref mut file) = self.current_file {
            file.write_all(&(data.len() as u32).to_le_bytes())?;
            file.write_all(&data)?;
            if self.sync_mode {
                file.flush()?;
            }
        }

        self.sequence = sequence;
        Ok(sequence)
    }

    pub fn flush(&mut self) -> WalResult<()> {
        if let Some(ref mut file) = self.current_file {
            file.flush()?;
        }
        Ok(())
    }

    /// Replay every record in sequence order. The sequence counter continues
    /// from the last replayed record. A truncated final record (torn write)
    /// ends replay of that file with a warning.
    pub fn replay<F>(&mut self, mut callback: F) -> WalResult<u64>
    where
        F: FnMut(Mutation),
    {
        let files = self.wal_files()?;
        let mut replayed = 0u64;

        for file_path in files {
            let mut reader = BufReader::new(File::open(&file_path)?);
            let mut buf = Vec::new();

            loop {
                let mut len_bytes = [0u8; 4];
                match reader.read_exact(&mut len_bytes) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }

                let len = u32::from_le_bytes(len_bytes) as usize;
                buf.resize(len, 0);
                match reader.read_exact(&mut buf) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        warn!("Truncated WAL record at end of {:?}", file_path);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }

                let record: WalRecord = bincode::deserialize(&buf)?;
                if !record.verify_checksum() {
                    warn!("WAL corruption detected at sequence {}", record.sequence);
                    return Err(WalError::Corruption(record.sequence));
                }

                self.sequence = self.sequence.max(record.sequence);
                callback(record.mutation);
                replayed += 1;
            }
        }

        info!("Replayed {} WAL records, last sequence: {}", replayed, self.sequence);
        Ok(replayed)
    }

    fn open_new_file(&mut self, first_sequence: u64) -> WalResult<()> {
        let file_path = self.path.join(format!("wal-{:016x}.log", first_sequence));
        debug!("Opening new WAL file: {:?}", file_path);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        self.current_file = Some(BufWriter::new(file));
        Ok(())
    }

    /// All WAL files, sorted by their starting sequence
    fn wal_files(&self) -> WalResult<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with("wal-") && name.ends_with(".log"))
                    .unwrap_or(false)
            })
            .map(|entry| entry.path())
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PropertyMap, VertexKey};
    use tempfile::TempDir;

    fn drop_vertex(i: u64) -> Mutation {
        Mutation::DropVertex {
            key: VertexKey::new("user", "user_id", format!("u{}", i)),
        }
    }

    #[test]
    fn test_wal_append() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::new(temp_dir.path()).unwrap();

        assert_eq!(wal.append(&drop_vertex(1)).unwrap(), 1);
        assert_eq!(wal.append(&drop_vertex(2)).unwrap(), 2);
        wal.flush().unwrap();
    }

    #[test]
    fn test_wal_replay_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::new(temp_dir.path()).unwrap();
            for i in 1..=5 {
                wal.append(&drop_vertex(i)).unwrap();
            }
            wal.flush().unwrap();
        }

        let mut wal = Wal::new(temp_dir.path()).unwrap();
        let mut seen = vec![];
        let count = wal.replay(|m| seen.push(m)).unwrap();
        assert_eq!(count, 5);
        assert_eq!(seen[0], drop_vertex(1));
        assert_eq!(wal.current_sequence(), 5);

        // New appends continue the sequence in a fresh file
        assert_eq!(wal.append(&drop_vertex(6)).unwrap(), 6);
        wal.flush().unwrap();

        let mut reopened = Wal::new(temp_dir.path()).unwrap();
        assert_eq!(reopened.replay(|_| {}).unwrap(), 6);
    }

    #[test]
    fn test_truncated_tail_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::new(temp_dir.path()).unwrap();
            wal.append(&Mutation::UpsertVertex {
                key: VertexKey::new("user", "user_id", "u1"),
                properties: PropertyMap::new(),
                links: vec![],
                backrefs: vec![],
            })
            .unwrap();
            wal.flush().unwrap();
        }

        let file = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .flatten()
            .next()
            .unwrap()
            .path();
        let mut handle = OpenOptions::new().append(true).open(&file).unwrap();
        handle.write_all(&64u32.to_le_bytes()).unwrap();
        handle.write_all(&[1, 2, 3]).unwrap();

        let mut wal = Wal::new(temp_dir.path()).unwrap();
        assert_eq!(wal.replay(|_| {}).unwrap(), 1);
    }
}
