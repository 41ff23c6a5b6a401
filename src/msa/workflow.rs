use super::{aligner::MsaAligner, consensus::alignment_consensus, locus::LocusJob};
use crate::utils::{fetch_contig, Result};
use bio::io::fasta;
use rust_htslib::faidx;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

const SCRATCH_PREFIX: &str = "contig-msa.";

pub struct Params {
    pub out_msa: PathBuf,
    pub tmp_dir: Option<PathBuf>,
    pub threshold: f64,
    pub ambiguous: u8,
}

/// Source of contig sequences by name.
pub trait ContigSource {
    fn fetch(&self, name: &str) -> Result<String>;
}

impl ContigSource for faidx::Reader {
    fn fetch(&self, name: &str) -> Result<String> {
        fetch_contig(self, name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocusConsensus {
    pub locus: String,
    pub sequence: String,
}

/// What a worker reports for one job: the consensus, or why there is none.
#[derive(Debug)]
pub struct LocusOutcome {
    pub locus: String,
    pub result: Result<LocusConsensus>,
}

pub fn alignment_path(out_msa: &Path, locus: &str) -> PathBuf {
    out_msa.join(format!("{}.fa", locus))
}

/// Runs one job to completion, turning a panic into a failed outcome.
pub fn run_job<S: ContigSource>(
    job: &LocusJob,
    contigs: &S,
    aligner: &dyn MsaAligner,
    params: &Params,
) -> LocusOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        process_job(job, contigs, aligner, params)
    }))
    .unwrap_or_else(|payload| {
        Err(format!(
            "Worker panicked on locus {}: {}",
            job.locus,
            panic_message(payload.as_ref())
        ))
    });
    LocusOutcome {
        locus: job.locus.clone(),
        result,
    }
}

pub fn process_job<S: ContigSource>(
    job: &LocusJob,
    contigs: &S,
    aligner: &dyn MsaAligner,
    params: &Params,
) -> Result<LocusConsensus> {
    let Some(first) = job.contigs.first() else {
        return Err(format!("Locus {} has no contigs", job.locus));
    };

    // Nothing to align for a lone contig
    if job.is_single_contig() {
        log::debug!("{}: single contig, forwarding {}", job.locus, first);
        return Ok(LocusConsensus {
            locus: job.locus.clone(),
            sequence: contigs.fetch(first)?,
        });
    }

    log::debug!("{}: aligning {} contigs", job.locus, job.contigs.len());
    let scratch = write_scratch_fasta(job, contigs, params.tmp_dir.as_deref())?;
    let msa_path = alignment_path(&params.out_msa, &job.locus);
    aligner
        .align(scratch.path(), &msa_path)
        .map_err(|e| format!("Alignment of locus {} failed: {}", job.locus, e))?;

    let sequence = alignment_consensus(&msa_path, params.threshold, params.ambiguous)?;
    scratch
        .close()
        .map_err(|e| format!("Failed to remove scratch file for {}: {}", job.locus, e))?;

    Ok(LocusConsensus {
        locus: job.locus.clone(),
        sequence,
    })
}

fn write_scratch_fasta<S: ContigSource>(
    job: &LocusJob,
    contigs: &S,
    tmp_dir: Option<&Path>,
) -> Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX).suffix(".fa");
    let mut scratch = match tmp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| format!("Failed to create scratch file for {}: {}", job.locus, e))?;

    {
        let mut writer = fasta::Writer::new(scratch.as_file_mut());
        for name in &job.contigs {
            let seq = contigs.fetch(name)?;
            writer
                .write(name, None, seq.as_bytes())
                .map_err(|e| format!("Failed to write scratch FASTA for {}: {}", job.locus, e))?;
        }
        writer
            .flush()
            .map_err(|e| format!("Failed to write scratch FASTA for {}: {}", job.locus, e))?;
    }
    Ok(scratch)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
