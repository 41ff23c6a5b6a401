mod barrier;
mod readers;
#[cfg(all(test, unix))]
mod test_utils;
mod util;

pub use barrier::CompletionBarrier;
pub use readers::{contig_names, fetch_contig, open_contig_reader};
#[cfg(all(test, unix))]
pub use test_utils::write_script;
pub use util::{handle_error_and_exit, Result};
