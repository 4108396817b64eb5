use anyhow::{Result, anyhow};
use crossbeam_channel::{Sender, bounded};
use rayon::prelude::*;
use std::thread::JoinHandle;

use super::{EntityVisitor, run_pass};
use crate::model::{Entity, Tags, Way};
use crate::network::{MembershipSets, NetworkCounters, NetworkCounts};
use crate::sinks::DatasetWriter;
use crate::source::DatasetReader;

const CLASSIFICATION_VALUE: &str = "yes";

/// Adds a classification tag to every way referenced by a cycle route.
///
/// Tagging a way depends only on its id, its tags and the membership sets,
/// so ways can be rewritten on any thread in any order.
pub struct WayTagger<'a> {
    sets: &'a MembershipSets,
    counters: NetworkCounters,
}

impl<'a> WayTagger<'a> {
    pub fn new(sets: &'a MembershipSets) -> Self {
        Self {
            sets,
            counters: NetworkCounters::default(),
        }
    }

    /// Classification tags go in front of the original tags, in class order.
    /// A way that already carries a class key keeps its own tag and gets no
    /// second copy, but the match is still counted. Ways without any match are
    /// returned as they came.
    pub fn tag_way(&self, way: Way) -> Way {
        let mut tags = Tags::new();
        for class in self.sets.classes_of(way.id) {
            self.counters.increment(class);
            if !way.tags.contains_key(class.tag_name()) {
                tags.push(class.tag_name(), CLASSIFICATION_VALUE);
            }
        }
        if tags.is_empty() {
            return way;
        }

        tags.extend(way.tags);
        Way { tags, ..way }
    }

    /// Nodes and relations pass through untouched.
    pub fn transform(&self, entity: Entity) -> Entity {
        match entity {
            Entity::Way(way) => Entity::Way(self.tag_way(way)),
            other => other,
        }
    }

    pub fn counts(&self) -> NetworkCounts {
        self.counters.snapshot()
    }
}

enum WriterCommand {
    Write(Vec<Entity>),
    Finish,
}

/// Second pass: tags each batch in parallel and forwards it, in order, to a
/// writer running on its own thread.
///
/// The writer is only finalized when the pass completes. If the pass is
/// abandoned the writer thread stops without finishing the output.
pub struct TaggingVisitor<'a> {
    tagger: WayTagger<'a>,
    tx: Option<Sender<WriterCommand>>,
    writer: Option<JoinHandle<Result<u64>>>,
}

impl<'a> TaggingVisitor<'a> {
    pub fn new(tagger: WayTagger<'a>, writer: Box<dyn DatasetWriter + Send>) -> Self {
        let (tx, rx) = bounded::<WriterCommand>(64);

        let writer = std::thread::spawn(move || -> Result<u64> {
            let mut writer = writer;
            let mut written = 0u64;
            for command in rx {
                match command {
                    WriterCommand::Write(batch) => {
                        for entity in batch {
                            writer.add(entity)?;
                            written += 1;
                        }
                    }
                    WriterCommand::Finish => {
                        writer.finish()?;
                        return Ok(written);
                    }
                }
            }
            Err(anyhow!(
                "Writer: pass ended before the last batch, output is incomplete"
            ))
        });

        Self {
            tagger,
            tx: Some(tx),
            writer: Some(writer),
        }
    }

    pub fn counts(&self) -> NetworkCounts {
        self.tagger.counts()
    }

    fn join_writer(&mut self) -> Result<u64> {
        drop(self.tx.take());
        let Some(handle) = self.writer.take() else {
            return Err(anyhow!("Pipeline: Writer thread already joined"));
        };
        match handle.join() {
            Ok(result) => result,
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow!("Pipeline: Writer thread panicked: {}", panic_msg))
            }
        }
    }

    fn send(&mut self, command: WriterCommand) -> Result<()> {
        let sent = match &self.tx {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        };
        if sent {
            return Ok(());
        }
        // The writer hung up; its own error is the root cause.
        match self.join_writer() {
            Err(writer_err) => {
                Err(writer_err.context("Pipeline: Writer thread failed (caused channel disconnect)"))
            }
            Ok(_) => Err(anyhow!("Pipeline: Failed to send entity batch to writer")),
        }
    }
}

impl EntityVisitor for TaggingVisitor<'_> {
    fn visit_batch(&mut self, batch: Vec<Entity>) -> Result<()> {
        let tagger = &self.tagger;
        let tagged: Vec<Entity> = batch
            .into_par_iter()
            .map(|entity| tagger.transform(entity))
            .collect();
        self.send(WriterCommand::Write(tagged))
    }

    fn finish(&mut self) -> Result<()> {
        self.send(WriterCommand::Finish)?;
        let written = self.join_writer()?;
        tracing::info!("Wrote {} entities", written);
        Ok(())
    }
}

impl Drop for TaggingVisitor<'_> {
    fn drop(&mut self) {
        if self.writer.is_some() {
            let _ = self.join_writer();
        }
    }
}

/// Runs the tagging pass, writing every entity of `reader` to `writer`.
pub fn tag_dataset(
    reader: &dyn DatasetReader,
    sets: &MembershipSets,
    writer: Box<dyn DatasetWriter + Send>,
) -> Result<NetworkCounts> {
    let mut visitor = TaggingVisitor::new(WayTagger::new(sets), writer);
    run_pass(reader, &mut visitor, "Pass 2/2: tagging ways")?;
    Ok(visitor.counts())
}
