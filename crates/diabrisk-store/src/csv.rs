//! Delimited-file codec for labelled tables.
//!
//! The header line is checked against the schema before Arrow decodes the
//! body, so a file whose columns are merely renamed or reordered is rejected
//! instead of silently mis-read.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use arrow::compute::concat_batches;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use diabrisk_core::{LabelledObservation, SchemaError, pima, table};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub(crate) enum CsvError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

/// Read a labelled table. A zero-byte file is an empty table.
pub(crate) fn read_labelled(path: &Path) -> Result<RecordBatch, CsvError> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut header = String::new();
    if reader.read_line(&mut header)? == 0 {
        return Ok(table::empty());
    }
    check_header(&header)?;

    let schema = pima::labelled_schema_ref();
    let decoder = ReaderBuilder::new(schema.clone())
        .with_header(false)
        .build_buffered(reader)?;
    let batches = decoder.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    // Label range and integral counts are not expressible in the Arrow schema.
    table::from_batch(&batch)?;
    Ok(batch)
}

/// Append rows to a labelled table, writing the header first if the file is
/// new or empty. Existing bytes are never rewritten, and a failed append
/// leaves the file at its previous length.
pub(crate) fn append_labelled(
    path: &Path,
    rows: &[LabelledObservation],
) -> Result<(), CsvError> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;

    let len = file.metadata()?.len();
    let mut buf = Vec::new();
    if len > 0 {
        let mut header = String::new();
        BufReader::new(&file).read_line(&mut header)?;
        check_header(&header)?;
        if !ends_with_newline(&mut file)? {
            buf.push(b'\n');
        }
    }

    let batch = table::to_batch(rows)?;
    {
        let mut writer = WriterBuilder::new().with_header(len == 0).build(&mut buf);
        writer.write(&batch)?;
    }

    // One write per append keeps a crash from leaving half a header behind.
    write_or_truncate(&file, &mut &file, len, &buf)?;
    Ok(())
}

/// Write `buf` through `sink` and sync `file`. On failure `file` is cut back
/// to `len` so no partial row survives.
fn write_or_truncate<W: Write>(
    file: &File,
    sink: &mut W,
    len: u64,
    buf: &[u8],
) -> std::io::Result<()> {
    let result = sink
        .write_all(buf)
        .and_then(|()| sink.flush())
        .and_then(|()| file.sync_data());
    if let Err(err) = result {
        if let Err(truncate) = file.set_len(len).and_then(|()| file.sync_data()) {
            warn!(error = %truncate, len, "could not roll back failed append");
        }
        return Err(err);
    }
    Ok(())
}

fn check_header(line: &str) -> Result<(), SchemaError> {
    let names: Vec<&str> = line
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n'])
        .split(',')
        .map(str::trim)
        .collect();
    pima::validate_header(&names)
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
