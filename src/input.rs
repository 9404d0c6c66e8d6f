//! Line-delimited JSON input: file discovery and parallel decoding

use crate::error::PipelineError;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub users_parsed: AtomicU64,
    pub businesses_parsed: AtomicU64,
    pub reviews_parsed: AtomicU64,
    pub files_processed: AtomicU64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Default::default()
    }
}

/// Which record stream a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Business,
    Review,
}

impl RecordKind {
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Business => "business",
            RecordKind::Review => "review",
        }
    }

    fn counter(self, stats: &ProcessingStats) -> &AtomicU64 {
        match self {
            RecordKind::User => &stats.users_parsed,
            RecordKind::Business => &stats.businesses_parsed,
            RecordKind::Review => &stats.reviews_parsed,
        }
    }
}

pub fn get_memory_usage() -> String {
    if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
        for line in status.lines() {
            if line.starts_with("VmRSS:") {
                return line.to_string();
            }
        }
    }
    "Memory info unavailable".to_string()
}

/// Resolves a literal path or glob pattern to a sorted list of non-empty files.
pub fn find_input_files(pattern: &str) -> Result<Vec<PathBuf>> {
    info!("Searching for input files with pattern: {}", pattern);

    let mut files = Vec::new();
    for entry in glob(pattern).map_err(|e| PipelineError::InvalidConfig(e.to_string()))? {
        match entry {
            Ok(path) => {
                if path.metadata()?.len() > 0 {
                    files.push(path);
                }
            }
            Err(e) => warn!("Error reading glob entry: {}", e),
        }
    }

    if files.is_empty() {
        anyhow::bail!("no non-empty input files match `{}`", pattern);
    }
    files.sort();
    info!("Found {} files for {}", files.len(), pattern);
    Ok(files)
}

fn open_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let inner: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(BufReader::with_capacity(2 * 1024 * 1024, inner))
}

/// Decodes every non-blank line of one file. Line numbers are 1-based.
pub fn read_file<T, F>(path: &Path, parse: &F) -> Result<Vec<T>>
where
    F: Fn(&str, usize) -> crate::error::Result<T>,
{
    let reader = open_reader(path)?;
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse(&line, idx + 1).with_context(|| format!("in {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// Decodes all files of one stream in parallel.
///
/// Records come back in file order, then line order. The first failure
/// aborts the whole stream.
pub fn read_records<T, F>(
    files: &[PathBuf],
    kind: RecordKind,
    parse: F,
    stats: &ProcessingStats,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&str, usize) -> crate::error::Result<T> + Sync,
{
    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7} files | {msg}",
    )?);
    progress.set_message(format!("Parsing {} records...", kind.name()));

    let per_file: Vec<Vec<T>> = files
        .par_iter()
        .map(|path| -> Result<Vec<T>> {
            let records = read_file(path, &parse)?;
            kind.counter(stats)
                .fetch_add(records.len() as u64, Ordering::Relaxed);
            stats.files_processed.fetch_add(1, Ordering::Relaxed);
            progress.inc(1);
            Ok(records)
        })
        .collect::<Result<_>>()?;

    progress.finish_with_message(format!("{} records parsed", kind.name()));

    let records: Vec<T> = per_file.into_iter().flatten().collect();
    info!("Parsed {} {} records", records.len(), kind.name());
    Ok(records)
}
