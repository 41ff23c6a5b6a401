use clap::Parser;
use contig_msa::{
    cli::{init_verbose, Cli, FULL_VERSION},
    commands::consensus,
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);

    log::info!(
        "Running {}-{}",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION
    );
    consensus::consensus(cli)?;
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
