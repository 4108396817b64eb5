use super::DatasetWriter;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::model::Entity;
use crate::opl::format_entity;

pub struct OplWriter {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl OplWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Writer: Failed to create {:?}", path))?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl DatasetWriter for OplWriter {
    fn add(&mut self, entity: Entity) -> Result<()> {
        writeln!(self.writer, "{}", format_entity(&entity))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Writer: Failed to flush OPL output")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opl::parse_entity;

    #[test]
    fn writes_one_line_per_entity() {
        let file = tempfile::NamedTempFile::with_suffix(".opl").unwrap();
        let lines = ["n1 Tname=A x1 y2", "w2 Tncn=yes,highway=path Nn1,n3", "r3 Ttype=route Mw2@"];

        let mut writer = OplWriter::new(file.path()).unwrap();
        for line in lines {
            writer.add(parse_entity(line).unwrap()).unwrap();
        }
        writer.finish().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), lines);
    }
}
