use crate::utils::{contig_names, Result};
use crossbeam_channel::Sender;
use indexmap::IndexMap;
use itertools::Itertools;
use rust_htslib::faidx;

const LOCUS_KEY_TOKENS: usize = 3;

/// A unit of work: all contigs assembled at one locus, in FASTA order.
#[derive(Debug, Clone, PartialEq)]
pub struct LocusJob {
    pub locus: String,
    pub contigs: Vec<String>,
}

impl LocusJob {
    pub fn is_single_contig(&self) -> bool {
        self.contigs.len() < 2
    }
}

/// Derives the locus key from a contig name, e.g. `chr1_1000_2000_3` -> `chr1_1000_2000`.
pub fn locus_key(name: &str) -> String {
    name.split('_').take(LOCUS_KEY_TOKENS).join("_")
}

/// Contig names bucketed by locus key.
///
/// Loci are kept in order of first appearance and every bucket keeps the
/// order in which its contigs were seen.
#[derive(Debug, Default)]
pub struct LocusIndex {
    buckets: IndexMap<String, Vec<String>>,
}

impl LocusIndex {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut buckets: IndexMap<String, Vec<String>> = IndexMap::new();
        for name in names {
            let name = name.into();
            if name.split('_').count() < LOCUS_KEY_TOKENS {
                log::warn!(
                    "Contig name '{}' has fewer than {} '_'-separated fields; using it as its own locus",
                    name,
                    LOCUS_KEY_TOKENS
                );
            }
            buckets.entry(locus_key(&name)).or_default().push(name);
        }
        Self { buckets }
    }

    pub fn from_reader(reader: &faidx::Reader) -> Result<Self> {
        Ok(Self::from_names(contig_names(reader)?))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn num_contigs(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn get(&self, locus: &str) -> Option<&[String]> {
        self.buckets.get(locus).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets
            .iter()
            .map(|(locus, contigs)| (locus.as_str(), contigs.as_slice()))
    }

    pub fn jobs(&self) -> Vec<LocusJob> {
        self.iter()
            .map(|(locus, contigs)| LocusJob {
                locus: locus.to_string(),
                contigs: contigs.to_vec(),
            })
            .collect()
    }
}

/// Pushes every job into the work channel, returning once all are queued.
///
/// Dropping the sender afterwards closes the channel, which is what tells
/// the workers there is nothing left to pull.
pub fn stream_jobs_into_channel(jobs: Vec<LocusJob>, sender: Sender<LocusJob>) -> Result<()> {
    for job in jobs {
        let locus = job.locus.clone();
        sender
            .send(job)
            .map_err(|_| format!("Failed to queue locus {}: workers are gone", locus))?;
    }
    Ok(())
}
