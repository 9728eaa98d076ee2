//! Append-only indexed store files.
//!
//! ```text
//! "ICDB" | version: u32 LE
//! record* (header + width*height u32 LE pixels)
//! index: varint count, then per key ascending: key u32 LE, varint offset, varint length
//! trailer: index offset u64 LE | "ICDB"
//! ```
//!
//! Offsets are absolute file positions. The index is only written by
//! [`StoreWriter::close`]; a store that was never closed has no trailer and
//! is rejected by [`StoreReader`].

use super::StoreError;
use super::header::{read_header, read_varint, write_header, write_varint};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 4] = b"ICDB";
const PREAMBLE_LEN: u64 = 8;
const TRAILER_LEN: usize = 12;

/// Totals of one closed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub path: PathBuf,
    pub records: usize,
    pub bytes: u64,
}

pub struct StoreWriter {
    path: PathBuf,
    out: BufWriter<File>,
    offset: u64,
    /// key → (offset, length)
    index: BTreeMap<u32, (u64, u64)>,
    buf: Vec<u8>,
}

impl StoreWriter {
    /// Create (truncate) a store file and write its preamble.
    pub fn create(path: &Path, version: u32) -> Result<Self, StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        out.write_all(MAGIC).map_err(io_err)?;
        out.write_all(&version.to_le_bytes()).map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            out,
            offset: PREAMBLE_LEN,
            index: BTreeMap::new(),
            buf: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: u32) -> bool {
        self.index.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Append one record. A key is written at most once per store.
    pub fn append(&mut self, key: u32, width: u32, height: u32, pixels: &[u32]) -> Result<(), StoreError> {
        if self.index.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                path: self.path.clone(),
                key,
            });
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(StoreError::PixelCount {
                key,
                expected,
                actual: pixels.len(),
            });
        }

        self.buf.clear();
        write_header(&mut self.buf, width, height);
        self.buf.reserve(pixels.len() * 4);
        for pixel in pixels {
            self.buf.extend_from_slice(&pixel.to_le_bytes());
        }
        self.out.write_all(&self.buf).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        let len = self.buf.len() as u64;
        self.index.insert(key, (self.offset, len));
        self.offset += len;
        Ok(())
    }

    /// Write the index and trailer, then flush.
    pub fn close(mut self) -> Result<StoreStats, StoreError> {
        let mut tail = Vec::new();
        write_varint(&mut tail, self.index.len() as u64);
        for (key, (offset, len)) in &self.index {
            tail.extend_from_slice(&key.to_le_bytes());
            write_varint(&mut tail, *offset);
            write_varint(&mut tail, *len);
        }
        tail.extend_from_slice(&self.offset.to_le_bytes());
        tail.extend_from_slice(MAGIC);

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        self.out.write_all(&tail).map_err(io_err)?;
        self.out.flush().map_err(io_err)?;
        Ok(StoreStats {
            records: self.index.len(),
            bytes: self.offset + tail.len() as u64,
            path: self.path,
        })
    }
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

/// Reads a closed store into memory.
pub struct StoreReader {
    version: u32,
    data: Vec<u8>,
    index: BTreeMap<u32, (u64, u64)>,
}

impl StoreReader {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let data = fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let corrupt = |reason: &'static str| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        if data.len() < PREAMBLE_LEN as usize + TRAILER_LEN || &data[..4] != MAGIC {
            return Err(corrupt("missing preamble"));
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let trailer = &data[data.len() - TRAILER_LEN..];
        if &trailer[8..] != MAGIC {
            return Err(corrupt("missing trailer, store was not closed"));
        }
        let mut offset_bytes = [0u8; 8];
        offset_bytes.copy_from_slice(&trailer[..8]);
        let index_start = u64::from_le_bytes(offset_bytes) as usize;
        let index_end = data.len() - TRAILER_LEN;
        if index_start < PREAMBLE_LEN as usize || index_start > index_end {
            return Err(corrupt("index offset out of range"));
        }

        let mut cursor = &data[index_start..index_end];
        let (count, used) = read_varint(cursor)?;
        cursor = &cursor[used..];
        let mut index = BTreeMap::new();
        for _ in 0..count {
            if cursor.len() < 4 {
                return Err(StoreError::Truncated("index key"));
            }
            let key = u32::from_le_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]);
            cursor = &cursor[4..];
            let (offset, used) = read_varint(cursor)?;
            cursor = &cursor[used..];
            let (len, used) = read_varint(cursor)?;
            cursor = &cursor[used..];
            if offset.saturating_add(len) > index_start as u64 {
                return Err(corrupt("record outside data section"));
            }
            index.insert(key, (offset, len));
        }

        Ok(Self {
            version,
            data,
            index,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: u32) -> Result<Option<Record>, StoreError> {
        let Some(&(offset, len)) = self.index.get(&key) else {
            return Ok(None);
        };
        let bytes = &self.data[offset as usize..(offset + len) as usize];
        let ((width, height), header_len) = read_header(bytes)?;
        let payload = &bytes[header_len..];
        let expected = width as usize * height as usize;
        if payload.len() != expected * 4 {
            return Err(StoreError::PixelCount {
                key,
                expected,
                actual: payload.len() / 4,
            });
        }
        let pixels = payload
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Some(Record {
            width,
            height,
            pixels,
        }))
    }
}
