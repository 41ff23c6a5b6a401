//! Defines the `ConsensusWriter` struct and the result-draining loop that feeds it.
//!
use super::workflow::{LocusConsensus, LocusOutcome};
use crate::utils::{CompletionBarrier, Result};
use bio::io::fasta;
use crossbeam_channel::Receiver;
use std::{fs::File, io::Write, path::Path};

/// Writes consensus sequences as two-line FASTA records.
pub struct ConsensusWriter<W: Write> {
    writer: fasta::Writer<W>,
}

impl ConsensusWriter<File> {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> ConsensusWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: fasta::Writer::new(writer),
        }
    }

    pub fn write(&mut self, consensus: &LocusConsensus) -> Result<()> {
        self.writer
            .write(&consensus.locus, None, consensus.sequence.as_bytes())
            .map_err(|e| format!("Failed to write consensus for {}: {}", consensus.locus, e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| format!("Failed to flush consensus output: {}", e))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

/// Drains outcomes in arrival order until every sender is gone.
///
/// Every drained outcome acknowledges `barrier`, including failed loci and
/// outcomes that could not be written, so the result phase always completes.
pub fn drain_results<W: Write>(
    receiver: &Receiver<LocusOutcome>,
    writer: &mut ConsensusWriter<W>,
    barrier: &CompletionBarrier,
) -> Result<WriteSummary> {
    let mut summary = WriteSummary::default();
    let mut write_error = None;

    for outcome in receiver {
        match outcome.result {
            Ok(consensus) if write_error.is_none() => match writer.write(&consensus) {
                Ok(()) => summary.written += 1,
                Err(e) => write_error = Some(e),
            },
            Ok(_) => {}
            Err(err) => {
                log::error!("Locus {} skipped: {}", outcome.locus, err);
                summary.failed += 1;
            }
        }
        barrier.ack();
    }

    if let Some(err) = write_error {
        return Err(err);
    }
    writer.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn success(locus: &str, seq: &str) -> LocusOutcome {
        LocusOutcome {
            locus: locus.to_string(),
            result: Ok(LocusConsensus {
                locus: locus.to_string(),
                sequence: seq.to_string(),
            }),
        }
    }

    #[test]
    fn summary_counts_written_records() {
        let (sender, receiver) = unbounded();
        sender.send(success("chr2_5_9", "TTTT")).unwrap();
        sender.send(success("chr1_1_4", "ACGN")).unwrap();
        drop(sender);

        let barrier = CompletionBarrier::new(2);
        let mut writer = ConsensusWriter::from_writer(Vec::new());
        let summary = drain_results(&receiver, &mut writer, &barrier).unwrap();

        assert_eq!(
            summary,
            WriteSummary {
                written: 2,
                failed: 0
            }
        );
        assert_eq!(barrier.remaining(), 0);
        writer.flush().unwrap();
    }

    #[test]
    fn failed_loci_are_counted_and_acked() {
        let (sender, receiver) = unbounded();
        sender.send(success("a_1_2", "AC")).unwrap();
        sender
            .send(LocusOutcome {
                locus: "b_1_2".to_string(),
                result: Err("muscle exited with exit status: 1".to_string()),
            })
            .unwrap();
        drop(sender);

        let barrier = CompletionBarrier::new(2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cons.fa");
        let mut writer = ConsensusWriter::new(&path).unwrap();
        let summary = drain_results(&receiver, &mut writer, &barrier).unwrap();
        drop(writer);

        assert_eq!(summary.written, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(barrier.remaining(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ">a_1_2\nAC\n");
    }

    #[test]
    fn two_line_records_on_disk() {
        let (sender, receiver) = unbounded();
        sender.send(success("chr2_5_9", "TTTT")).unwrap();
        sender.send(success("chr1_1_4", "ACGN")).unwrap();
        drop(sender);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cons.fa");
        let mut writer = ConsensusWriter::new(&path).unwrap();
        drain_results(&receiver, &mut writer, &CompletionBarrier::new(2)).unwrap();
        drop(writer);

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            ">chr2_5_9\nTTTT\n>chr1_1_4\nACGN\n"
        );
    }
}
