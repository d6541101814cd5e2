//! Batched CSV source reading with resume support.
//!
//! A source is one header line naming the columns, then data rows. Rows are
//! streamed in bounded batches so memory never holds more than one chunk.
//! Fields may be double-quoted to carry commas (doubled quotes escape a
//! quote); embedded newlines are not supported. Blank lines are not data rows
//! and are ignored by both the counter and the reader.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// A CSV file treated as a row source.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count data rows once up front: header excluded, blank lines ignored.
    pub fn count_data_rows(&self) -> Result<u64> {
        let file = File::open(&self.path)
            .with_context(|| format!("open source {}", self.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        if lines.next().transpose().context("read source header")?.is_none() {
            return Ok(0);
        }
        let mut count = 0u64;
        for line in lines {
            let line = line.context("read source line")?;
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        debug!(path = %self.path.display(), count, "counted source rows");
        Ok(count)
    }

    /// Open a streaming reader positioned after the header.
    pub fn rows(&self) -> Result<CsvRows> {
        let file = File::open(&self.path)
            .with_context(|| format!("open source {}", self.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let header_line = lines
            .next()
            .transpose()
            .context("read source header")?
            .ok_or_else(|| anyhow!("source {} has no header row", self.path.display()))?;
        let header = split_fields(strip_carriage_return(&header_line));
        Ok(CsvRows { lines, header })
    }
}

/// Streaming data-row reader for one open source file.
#[derive(Debug)]
pub struct CsvRows {
    lines: Lines<BufReader<File>>,
    header: Vec<String>,
}

impl CsvRows {
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Skip `n` data rows, for checkpoint resume. Stops quietly at EOF, so an
    /// offset beyond the file yields only empty batches afterwards.
    pub fn skip_rows(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            if self.next_row()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Read up to `size` data rows; an empty batch means EOF.
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<Vec<String>>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next_row()? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }

    fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            let Some(line) = self.lines.next().transpose().context("read source line")? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(split_fields(strip_carriage_return(&line))));
        }
    }
}

fn strip_carriage_return(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split one line into fields. Double quotes delimit fields containing
/// commas; a doubled quote inside a quoted field is a literal quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
