use super::DatasetWriter;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::model::Entity;

pub struct JsonlWriter {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl JsonlWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Writer: Failed to create {:?}", path))?;
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
        })
    }
}

impl DatasetWriter for JsonlWriter {
    fn add(&mut self, entity: Entity) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &entity)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Writer: Failed to flush JSONL output")?;
        Ok(())
    }
}
