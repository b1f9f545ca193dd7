//! Table file format: columnar on-disk snapshot of a versioned table
//!
//! Layout: a fixed 64-byte header followed by length-prefixed blocks. The
//! first block holds the schema; every following block holds one column, in
//! the order key fields, `from_time`, `to_time`, `change_time`, value fields.
//! Blocks are bincode-encoded and ZSTD-compressed; the header carries a CRC32
//! over all compressed block bytes.

use crate::core::record::VersionedRecord;
use crate::core::schema::{Schema, CHANGE_TIME, FROM_TIME, TO_TIME};
use crate::core::temporal::Timestamp;
use crate::core::value::{Key, Scalar};
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc32fast::Hasher as Crc32Hasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Table file format version
pub const TABLE_FILE_VERSION: u8 = 1;

/// Header size (64 bytes)
pub const HEADER_SIZE: usize = 64;

/// Magic number: "PITD0"
pub const MAGIC: &[u8; 5] = b"PITD0";

/// Compression level for ZSTD (1-22, higher = better compression but slower)
pub const ZSTD_COMPRESSION_LEVEL: i32 = 3;

/// Flag bits in TableFileHeader.flags
pub const FLAG_COMPRESSED: u8 = 0x01; // Blocks are compressed with ZSTD

/// Table file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFileHeader {
    pub row_count: u64,
    pub column_count: u32,
    pub body_size: u64,
    pub checksum: u32,
    pub flags: u8,
    pub written_at: Timestamp,
}

impl TableFileHeader {
    /// Serialize header to bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);

        buf.put_slice(MAGIC);
        buf.put_u8(TABLE_FILE_VERSION);
        // Reserved
        buf.put_u16(0);
        buf.put_u64(self.row_count);
        buf.put_u32(self.column_count);
        buf.put_u64(self.body_size);
        buf.put_u32(self.checksum);
        buf.put_u8(self.flags);
        buf.put_i64(self.written_at.as_nanos());

        // Padding to 64 bytes: 5+1+2+8+4+8+4+1+8 = 41, need 23 more
        buf.put_bytes(0, 23);

        debug_assert_eq!(buf.len(), HEADER_SIZE);
        buf.freeze()
    }

    /// Deserialize header from bytes
    pub fn deserialize(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Storage("Invalid header size".to_string()));
        }

        let magic = &buf[0..5];
        if magic != MAGIC {
            return Err(Error::Storage(format!("Invalid magic number: {:?}", magic)));
        }
        buf.advance(5);

        let version = buf.get_u8();
        if version != TABLE_FILE_VERSION {
            return Err(Error::Storage(format!("Unsupported version: {}", version)));
        }
        buf.advance(2);

        let row_count = buf.get_u64();
        let column_count = buf.get_u32();
        let body_size = buf.get_u64();
        let checksum = buf.get_u32();
        let flags = buf.get_u8();
        let written_at = Timestamp::from_nanos(buf.get_i64());

        Ok(Self {
            row_count,
            column_count,
            body_size,
            checksum,
            flags,
            written_at,
        })
    }
}

/// Values of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Key or value field
    Scalars(Vec<Scalar>),
    /// Required instants as nanoseconds since the Unix epoch
    Instants(Vec<i64>),
    /// Instants where `None` marks an open interval
    OptionalInstants(Vec<Option<i64>>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            Self::Scalars(v) => v.len(),
            Self::Instants(v) => v.len(),
            Self::OptionalInstants(v) => v.len(),
        }
    }
}

/// One named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBlock {
    pub name: String,
    pub data: ColumnData,
}

/// Splits rows into columns in file order
fn columns_of(schema: &Schema, rows: &[VersionedRecord]) -> Vec<ColumnBlock> {
    let mut columns = Vec::with_capacity(schema.key_fields().len() + schema.value_fields().len() + 3);

    for (pos, name) in schema.key_fields().iter().enumerate() {
        columns.push(ColumnBlock {
            name: name.clone(),
            data: ColumnData::Scalars(
                rows.iter()
                    .map(|row| row.key.values().get(pos).cloned().unwrap_or(Scalar::Null))
                    .collect(),
            ),
        });
    }
    columns.push(ColumnBlock {
        name: FROM_TIME.to_string(),
        data: ColumnData::Instants(rows.iter().map(|row| row.from_time.as_nanos()).collect()),
    });
    columns.push(ColumnBlock {
        name: TO_TIME.to_string(),
        data: ColumnData::OptionalInstants(
            rows.iter().map(|row| row.to_time.map(|t| t.as_nanos())).collect(),
        ),
    });
    columns.push(ColumnBlock {
        name: CHANGE_TIME.to_string(),
        data: ColumnData::Instants(rows.iter().map(|row| row.change_time.as_nanos()).collect()),
    });
    for name in schema.value_fields() {
        columns.push(ColumnBlock {
            name: name.clone(),
            data: ColumnData::Scalars(
                rows.iter()
                    .map(|row| row.values.get(name).cloned().unwrap_or(Scalar::Null))
                    .collect(),
            ),
        });
    }

    columns
}

/// Reassembles rows from columns written by [`columns_of`]
fn rows_of(schema: &Schema, columns: Vec<ColumnBlock>, row_count: usize) -> Result<Vec<VersionedRecord>> {
    let expected: Vec<&str> = schema
        .key_fields()
        .iter()
        .map(String::as_str)
        .chain([FROM_TIME, TO_TIME, CHANGE_TIME])
        .chain(schema.value_fields().iter().map(String::as_str))
        .collect();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    if names != expected {
        return Err(Error::Storage(format!(
            "Column layout {:?} does not match schema {:?}",
            names, expected
        )));
    }
    if let Some(column) = columns.iter().find(|c| c.data.len() != row_count) {
        return Err(Error::Storage(format!(
            "Column {} has {} values, expected {}",
            column.name,
            column.data.len(),
            row_count
        )));
    }

    let key_len = schema.key_fields().len();
    let mut keys: Vec<Vec<Scalar>> = vec![Vec::with_capacity(key_len); row_count];
    let mut values: Vec<BTreeMap<String, Scalar>> = vec![BTreeMap::new(); row_count];
    let mut from_times = Vec::new();
    let mut to_times = Vec::new();
    let mut change_times = Vec::new();

    for (i, column) in columns.into_iter().enumerate() {
        match (column.name.as_str(), column.data) {
            (FROM_TIME, ColumnData::Instants(v)) => from_times = v,
            (TO_TIME, ColumnData::OptionalInstants(v)) => to_times = v,
            (CHANGE_TIME, ColumnData::Instants(v)) => change_times = v,
            (_, ColumnData::Scalars(v)) if i < key_len => {
                for (key, value) in keys.iter_mut().zip(v) {
                    key.push(value);
                }
            }
            (name, ColumnData::Scalars(v)) if i >= key_len + 3 => {
                for (row, value) in values.iter_mut().zip(v) {
                    row.insert(name.to_string(), value);
                }
            }
            (name, _) => {
                return Err(Error::Storage(format!("Column {} has the wrong type", name)));
            }
        }
    }

    Ok(keys
        .into_iter()
        .zip(values)
        .zip(from_times.into_iter().zip(to_times).zip(change_times))
        .map(|((key, values), ((from, to), change))| VersionedRecord {
            key: Key::new(key),
            values,
            from_time: Timestamp::from_nanos(from),
            to_time: to.map(Timestamp::from_nanos),
            change_time: Timestamp::from_nanos(change),
        })
        .collect())
}

/// Table file writer
pub struct TableFileWriter;

impl TableFileWriter {
    /// Write `rows` to `path`.
    ///
    /// The file is written next to `path` and renamed into place, so a
    /// reader never sees a partial table.
    pub fn write(path: &Path, schema: &Schema, rows: &[VersionedRecord]) -> Result<TableFileHeader> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let columns = columns_of(schema, rows);
        let mut body = BytesMut::new();
        let mut checksum_hasher = Crc32Hasher::new();

        Self::put_block(&mut body, &mut checksum_hasher, &bincode::serialize(schema)?)?;
        for column in &columns {
            Self::put_block(&mut body, &mut checksum_hasher, &bincode::serialize(column)?)?;
        }

        let header = TableFileHeader {
            row_count: rows.len() as u64,
            column_count: columns.len() as u32,
            body_size: body.len() as u64,
            checksum: checksum_hasher.finalize(),
            flags: FLAG_COMPRESSED,
            written_at: Timestamp::now(),
        };

        let tmp_path = Self::tmp_path(path);
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&header.serialize())?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;

        debug!(
            path = %path.display(),
            rows = header.row_count,
            bytes = HEADER_SIZE as u64 + header.body_size,
            "wrote table file"
        );
        Ok(header)
    }

    fn put_block(body: &mut BytesMut, hasher: &mut Crc32Hasher, raw: &[u8]) -> Result<()> {
        let compressed = zstd::encode_all(raw, ZSTD_COMPRESSION_LEVEL)
            .map_err(|e| Error::Storage(format!("ZSTD compression failed: {}", e)))?;
        let len = (compressed.len() as u32).to_le_bytes();

        hasher.update(&len);
        hasher.update(&compressed);
        body.put_slice(&len);
        body.put_slice(&compressed);
        Ok(())
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

/// Table file reader
pub struct TableFileReader {
    file: File,
    header: TableFileHeader,
    path: PathBuf,
}

impl TableFileReader {
    /// Open an existing table file and read its header
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let mut header_buf = vec![0u8; HEADER_SIZE];
        file.read_exact(&mut header_buf)?;
        let header = TableFileHeader::deserialize(&header_buf)?;

        Ok(Self {
            file,
            header,
            path: path.to_path_buf(),
        })
    }

    /// Read the schema and every row, verifying the checksum
    pub fn read_table(&mut self) -> Result<(Schema, Vec<VersionedRecord>)> {
        // The header is not checksummed; size nothing from it before checking it
        // against the file itself.
        let on_disk = self.file.metadata()?.len().saturating_sub(HEADER_SIZE as u64);
        if on_disk != self.header.body_size {
            return Err(Error::Storage(format!(
                "Truncated table file: expected {} body bytes, found {}",
                self.header.body_size, on_disk
            )));
        }

        let mut body = Vec::new();
        self.file.read_to_end(&mut body)?;
        if body.len() as u64 != self.header.body_size {
            return Err(Error::Storage(format!(
                "Truncated table file: expected {} body bytes, found {}",
                self.header.body_size,
                body.len()
            )));
        }

        let mut checksum_hasher = Crc32Hasher::new();
        let mut blocks = Vec::new();
        let mut buf = &body[..];
        while buf.has_remaining() {
            if buf.remaining() < 4 {
                return Err(Error::Storage("Truncated block length".to_string()));
            }
            let len_bytes = [buf[0], buf[1], buf[2], buf[3]];
            let block_len = u32::from_le_bytes(len_bytes) as usize;
            buf.advance(4);
            if buf.remaining() < block_len {
                return Err(Error::Storage("Truncated block data".to_string()));
            }

            let (block, rest) = buf.split_at(block_len);
            checksum_hasher.update(&len_bytes);
            checksum_hasher.update(block);
            blocks.push(block);
            buf = rest;
        }

        let calculated_checksum = checksum_hasher.finalize();
        if calculated_checksum != self.header.checksum {
            return Err(Error::Storage(format!(
                "Checksum mismatch: expected {}, got {}",
                self.header.checksum, calculated_checksum
            )));
        }

        let (schema_block, column_blocks) = blocks
            .split_first()
            .ok_or_else(|| Error::Storage("Missing schema block".to_string()))?;
        let schema: Schema = bincode::deserialize(&Self::decompress(schema_block)?)?;
        // Re-run schema validation on whatever the file claims
        let schema = Schema::new(schema.key_fields().to_vec(), schema.value_fields().to_vec())?;

        if column_blocks.len() != self.header.column_count as usize {
            return Err(Error::Storage(format!(
                "Expected {} columns, found {}",
                self.header.column_count,
                column_blocks.len()
            )));
        }
        let columns = column_blocks
            .iter()
            .map(|block| -> Result<ColumnBlock> {
                Ok(bincode::deserialize(&Self::decompress(block)?)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = rows_of(&schema, columns, self.header.row_count as usize)?;
        Ok((schema, rows))
    }

    fn decompress(block: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(block)
            .map_err(|e| Error::Storage(format!("ZSTD decompression failed: {}", e)))
    }

    pub fn header(&self) -> &TableFileHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
