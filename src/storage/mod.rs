//! Storage layer: columnar table files

pub mod table_file;

pub use table_file::{
    ColumnBlock, ColumnData, TableFileHeader, TableFileReader, TableFileWriter, FLAG_COMPRESSED,
    HEADER_SIZE, MAGIC, TABLE_FILE_VERSION,
};
