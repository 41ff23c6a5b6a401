use crate::cli::Cli;
use crate::msa::{
    drain_results, run_job, stream_jobs_into_channel, ConsensusWriter, LocusIndex, LocusJob,
    LocusOutcome, MsaAligner, Muscle, Params, WriteSummary,
};
use crate::utils::{open_contig_reader, CompletionBarrier, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use rust_htslib::faidx;
use std::{
    cell::RefCell,
    fs,
    io::Write,
    path::PathBuf,
    sync::Arc,
    thread::{self},
};

#[derive(Debug, Clone)]
struct ThreadContextParams {
    contigs_path: PathBuf,
}

thread_local! {
    static CTX_PARAMS: RefCell<Option<ThreadContextParams>> = const { RefCell::new(None) };
    // Contig reader, opened on first use by each worker
    static THREAD_CONTIG_READER: RefCell<Option<Result<faidx::Reader>>> = const { RefCell::new(None) };
}

fn create_thread_local_contig_reader() -> Result<faidx::Reader> {
    let path = CTX_PARAMS.with(|ctx_cell| {
        ctx_cell
            .borrow()
            .as_ref()
            .map(|ctx| ctx.contigs_path.clone())
            .ok_or_else(|| "Thread context parameters not initialized for contig path".to_string())
    })?;
    open_contig_reader(&path)
}

const CHANNEL_BUFFER_SIZE: usize = 2048;

pub fn consensus(args: Cli) -> Result<()> {
    let contig_reader = open_contig_reader(&args.contigs_path)?;
    let index = LocusIndex::from_reader(&contig_reader)?;
    drop(contig_reader);
    if index.is_empty() {
        return Err(format!(
            "No contigs found in {}",
            args.contigs_path.display()
        ));
    }
    log::info!(
        "Found {} loci from {} contigs",
        index.len(),
        index.num_contigs()
    );

    fs::create_dir_all(&args.out_msa).map_err(|e| {
        format!(
            "Failed to create alignment directory {}: {}",
            args.out_msa.display(),
            e
        )
    })?;

    let aligner = Muscle::resolve(args.muscle_path.clone(), args.muscle_syntax)?;
    log::info!("Aligner: {}", aligner.name());

    let writer = ConsensusWriter::new(&args.out_cons)?;

    let num_threads = args.num_threads.unwrap_or_else(num_cpus::get);
    let params = Params {
        out_msa: args.out_msa.clone(),
        tmp_dir: args.tmp_dir.clone(),
        threshold: args.threshold,
        ambiguous: args.ambiguous as u8,
    };

    let num_loci = index.len();
    let summary = run_pipeline(
        index.jobs(),
        num_threads,
        ThreadContextParams {
            contigs_path: args.contigs_path.clone(),
        },
        Arc::new(aligner),
        Arc::new(params),
        writer,
    )?;

    log::info!(
        "Wrote {} consensus sequences to {}",
        summary.written,
        args.out_cons.display()
    );
    if summary.failed > 0 {
        return Err(format!(
            "{} of {} loci failed; see errors above",
            summary.failed, num_loci
        ));
    }
    Ok(())
}

/// Runs the two pipeline phases: every job is processed by the worker pool,
/// and only then are the buffered outcomes drained into `writer`.
fn run_pipeline<W: Write + Send + 'static>(
    jobs: Vec<LocusJob>,
    num_threads: usize,
    thread_context: ThreadContextParams,
    aligner: Arc<dyn MsaAligner>,
    params: Arc<Params>,
    mut writer: ConsensusWriter<W>,
) -> Result<WriteSummary> {
    let num_jobs = jobs.len();
    let job_barrier = Arc::new(CompletionBarrier::new(num_jobs));
    let result_barrier = Arc::new(CompletionBarrier::new(num_jobs));

    let (sender_job, receiver_job) = bounded(CHANNEL_BUFFER_SIZE);
    let job_stream_thread = thread::spawn(move || stream_jobs_into_channel(jobs, sender_job));

    // Unbounded: outcomes pile up here until the job phase is over
    let (sender_result, receiver_result) = unbounded();

    log::debug!("Initializing thread pool with {} threads...", num_threads);
    let pool = initialize_thread_pool(num_threads, thread_context)?;
    let worker_barrier = Arc::clone(&job_barrier);
    let worker_thread = thread::spawn(move || {
        pool.install(|| {
            receiver_job
                .into_iter()
                .par_bridge()
                .for_each_with(sender_result, |s, job| {
                    process_locus(job, aligner.as_ref(), &params, s);
                    worker_barrier.ack();
                });
        });
    });

    log::info!("Processing {} loci on {} threads", num_jobs, num_threads);
    job_barrier.wait();
    log::info!("All loci processed");

    let writer_barrier = Arc::clone(&result_barrier);
    let writer_thread =
        thread::spawn(move || drain_results(&receiver_result, &mut writer, &writer_barrier));
    result_barrier.wait();
    log::info!("All results drained");

    // Clean-up
    worker_thread
        .join()
        .map_err(|_| "Worker pool panicked".to_string())?;
    log::trace!("Worker pool finished");
    job_stream_thread
        .join()
        .map_err(|_| "Job stream thread panicked".to_string())??;
    log::trace!("Job stream thread finished");
    let summary = writer_thread
        .join()
        .map_err(|_| "Writer thread panicked".to_string())??;
    log::trace!("Writer thread finished");

    Ok(summary)
}

fn process_locus(
    job: LocusJob,
    aligner: &dyn MsaAligner,
    params: &Params,
    sender_result: &Sender<LocusOutcome>,
) {
    let outcome = THREAD_CONTIG_READER.with(|reader_cell| {
        let mut slot = reader_cell.borrow_mut();
        match slot.get_or_insert_with(create_thread_local_contig_reader) {
            Ok(reader) => run_job(&job, &*reader, aligner, params),
            Err(err) => LocusOutcome {
                locus: job.locus.clone(),
                result: Err(format!("Cannot read contigs: {}", err)),
            },
        }
    });
    if let Err(e) = sender_result.send(outcome) {
        log::error!(
            "Failed to send result of locus {} to writer: {}",
            job.locus,
            e
        );
    }
}

fn initialize_thread_pool(
    num_threads: usize,
    thread_context: ThreadContextParams,
) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("contig-msa-{}", i))
        .start_handler(move |_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = Some(thread_context.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}
