pub mod aligner;
pub mod consensus;
pub mod locus;
pub mod workflow;
pub mod writer;

pub use aligner::{Muscle, MsaAligner, MuscleSyntax, MUSCLE_ENV};
pub use consensus::{majority_consensus, DEFAULT_AMBIGUOUS, DEFAULT_THRESHOLD};
pub use locus::{locus_key, stream_jobs_into_channel, LocusIndex, LocusJob};
pub use workflow::{run_job, ContigSource, LocusConsensus, LocusOutcome, Params};
pub use writer::{drain_results, ConsensusWriter, WriteSummary};
