use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{DatasetReader, Interest};
use crate::model::EntityKind;
use crate::opl::{OplError, parse_entity};
use crate::pipeline::{EntityVisitor, PassStats};
use crate::utils::ProgressCounter;

/// Reads OPL text files. Blank lines and `#` comments are skipped.
pub struct OplReader {
    path: PathBuf,
    batch_size: usize,
    progress: bool,
}

impl OplReader {
    pub fn new<P: AsRef<Path>>(path: P, batch_size: usize, progress: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            batch_size: batch_size.max(1),
            progress,
        }
    }
}

fn line_kind(line: &str) -> Result<EntityKind, OplError> {
    match line.chars().next() {
        Some('n') => Ok(EntityKind::Node),
        Some('w') => Ok(EntityKind::Way),
        Some('r') => Ok(EntityKind::Relation),
        Some(other) => Err(OplError::UnknownEntity(other)),
        None => Err(OplError::Empty),
    }
}

impl DatasetReader for OplReader {
    fn read(&self, visitor: &mut dyn EntityVisitor, label: &'static str) -> Result<PassStats> {
        let file = File::open(&self.path)
            .with_context(|| format!("Reader: Failed to open {:?}", self.path))?;
        let interest = Interest::of(visitor);
        let progress = ProgressCounter::new(label, 100_000, self.progress);
        let mut stats = PassStats::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Reader: Failed to read {:?}", self.path))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let context = || format!("Reader: {}:{}: invalid OPL line", self.path.display(), index + 1);

            let kind = line_kind(line).with_context(context)?;
            stats.record(kind);
            if !interest.wants(kind) {
                continue;
            }
            batch.push(parse_entity(line).with_context(context)?);

            if batch.len() >= self.batch_size {
                progress.inc(batch.len() as u64);
                visitor.visit_batch(std::mem::take(&mut batch))?;
            }
        }
        if !batch.is_empty() {
            progress.inc(batch.len() as u64);
            visitor.visit_batch(batch)?;
        }

        progress.finish();
        Ok(stats)
    }
}
