//! Streaming decoder for gzip-compressed, newline-delimited movie records.
//!
//! The decoder is a plain blocking iterator; the runner drives it from a
//! blocking thread. It stops at the first bad line: a single malformed or
//! invalid record rejects the whole dataset.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use super::error::{ImportError, ImportResult};
use super::record::CatalogRecord;

pub const DEFAULT_LINE_BUFFER_BYTES: usize = 64 * 1024;
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Initial capacity of the line buffer.
    pub line_buffer_bytes: usize,
    /// Longest accepted line, excluding the newline.
    pub max_line_bytes: usize,
}

impl DecoderOptions {
    /// A zero-sized read buffer reports end of stream on the first fill, so
    /// both sizes are kept at one byte or more.
    pub fn normalized(self) -> Self {
        Self {
            line_buffer_bytes: self.line_buffer_bytes.max(1),
            max_line_bytes: self.max_line_bytes.max(1),
        }
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            line_buffer_bytes: DEFAULT_LINE_BUFFER_BYTES,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// A validated record together with the 1-based line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub line: u64,
    pub record: CatalogRecord,
}

pub struct RecordDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    line: u64,
    max_line_bytes: usize,
    done: bool,
}

/// Opens a `.json.gz` dataset for decoding.
pub fn open_dataset(
    path: &Path,
    opts: DecoderOptions,
) -> ImportResult<RecordDecoder<BufReader<MultiGzDecoder<BufReader<File>>>>> {
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RecordDecoder::gzip(BufReader::new(file), opts))
}

impl<R: Read> RecordDecoder<BufReader<MultiGzDecoder<R>>> {
    /// Decodes a gzip stream, decompressing transparently. Concatenated
    /// members (pigz, `cat a.gz b.gz`) are read as one stream.
    pub fn gzip(compressed: R, opts: DecoderOptions) -> Self {
        let opts = opts.normalized();
        let reader =
            BufReader::with_capacity(opts.line_buffer_bytes, MultiGzDecoder::new(compressed));
        Self::new(reader, opts)
    }
}

impl<R: BufRead> RecordDecoder<R> {
    /// Decodes an already-decompressed line stream.
    pub fn new(reader: R, opts: DecoderOptions) -> Self {
        let opts = opts.normalized();
        Self {
            reader,
            buf: Vec::with_capacity(
                opts.line_buffer_bytes.min(opts.max_line_bytes.saturating_add(2)),
            ),
            line: 0,
            max_line_bytes: opts.max_line_bytes,
            done: false,
        }
    }

    /// Reads the next raw line into `self.buf`, without its line terminator.
    /// Returns `Ok(false)` at end of stream.
    fn read_line(&mut self) -> ImportResult<bool> {
        self.buf.clear();
        // The cap applies to content only: leave room for a CRLF terminator.
        let limit = (self.max_line_bytes as u64).saturating_add(2);
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| ImportError::Decode {
                line: self.line + 1,
                reason: format!("scan gzip payload: {e}"),
            })?;
        if n == 0 {
            return Ok(false);
        }
        self.line += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.len() > self.max_line_bytes {
            return Err(ImportError::LineTooLong {
                line: self.line,
                limit: self.max_line_bytes,
            });
        }
        Ok(true)
    }

    fn decode_current(&self) -> ImportResult<Option<CatalogRecord>> {
        let text = std::str::from_utf8(&self.buf).map_err(|e| ImportError::Decode {
            line: self.line,
            reason: format!("invalid UTF-8: {e}"),
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let record: CatalogRecord =
            serde_json::from_str(text).map_err(|e| ImportError::Decode {
                line: self.line,
                reason: format!("invalid JSON: {e}"),
            })?;
        record
            .validate()
            .map_err(|reason| ImportError::Validation {
                line: self.line,
                reason: reason.to_string(),
            })?;
        Ok(Some(record))
    }

    fn next_record(&mut self) -> ImportResult<Option<DecodedRecord>> {
        while self.read_line()? {
            if let Some(record) = self.decode_current()? {
                return Ok(Some(DecodedRecord {
                    line: self.line,
                    record,
                }));
            }
        }
        Ok(None)
    }

    /// Number of lines consumed so far, blank lines included.
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> Iterator for RecordDecoder<R> {
    type Item = ImportResult<DecodedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
