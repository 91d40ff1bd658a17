//! Content fingerprints for files and rows.

use crate::error::{IngestError, Result};
use crate::sql::{quote_identifier, quote_literal, NULL_SENTINEL};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 1 << 20;

/// md5 of a file together with the number of bytes it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub md5: String,
    pub size: u64,
}

/// Lowercase hex md5 of a file's bytes, read in 1 MiB chunks.
pub fn file_fingerprint(path: &Path) -> Result<String> {
    Ok(fingerprint_file(path)?.md5)
}

/// As [`file_fingerprint`], also counting the bytes that were hashed.
pub fn fingerprint_file(path: &Path) -> Result<FileFingerprint> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => IngestError::FileNotFound(path.to_path_buf()),
        _ => IngestError::Io(e),
    })?;

    let mut context = md5::Context::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
        size += n as u64;
    }
    Ok(FileFingerprint {
        md5: format!("{:x}", context.compute()),
        size,
    })
}

/// SQL expression yielding a 32-hex-char md5 per row.
///
/// Columns are sorted by name so header order does not matter. NULL is
/// replaced by `<NULL>` and every value is written as `length:value`, joined
/// with `|`, so a value containing `|` cannot be mistaken for a boundary.
/// The expression is evaluated by DuckDB at insert time.
pub fn row_fingerprint_expression(column_names: &[String]) -> String {
    let mut columns: Vec<&String> = column_names.iter().collect();
    columns.sort();

    let pieces = columns
        .into_iter()
        .map(|col| {
            let val = format!(
                "coalesce({}, {})",
                quote_identifier(col),
                quote_literal(NULL_SENTINEL)
            );
            format!("cast(length({val}) as varchar) || ':' || {val}")
        })
        .collect::<Vec<_>>();

    if pieces.is_empty() {
        return "md5('')".to_string();
    }
    format!("md5({})", pieces.join(" || '|' || "))
}
