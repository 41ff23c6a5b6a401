use crate::msa::{MuscleSyntax, DEFAULT_AMBIGUOUS, DEFAULT_THRESHOLD, MUSCLE_ENV};
use crate::utils::Result;
use clap::{ArgAction, Parser};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser, Debug)]
#[command(name="contig-msa",
          version=&**FULL_VERSION,
          about="Build consensus sequences from assembled contigs",
          long_about = None,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "contigs")]
    #[clap(help = "Indexed FASTA with assembled contigs")]
    #[clap(value_name = "CONTIGS")]
    #[arg(value_parser = check_file_exists)]
    pub contigs_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "out_cons")]
    #[clap(visible_alias = "out-cons")]
    #[clap(help = "Output FASTA with one consensus sequence per locus")]
    #[clap(value_name = "OUT_CONS")]
    #[arg(value_parser = check_prefix_path)]
    pub out_cons: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "out_msa")]
    #[clap(visible_alias = "out-msa")]
    #[clap(help = "Output directory for per-locus alignments (created if absent)")]
    #[clap(value_name = "OUT_MSA")]
    #[arg(value_parser = check_prefix_path)]
    pub out_msa: PathBuf,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of worker threads [default: number of logical CPUs]")]
    #[clap(value_name = "THREADS")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: Option<usize>,

    #[clap(help_heading("Aligner"))]
    #[clap(long = "muscle")]
    #[clap(env = MUSCLE_ENV)]
    #[clap(help = "Path to the MUSCLE binary [default: muscle on PATH]")]
    #[clap(value_name = "MUSCLE")]
    #[arg(value_parser = check_file_exists)]
    pub muscle_path: Option<PathBuf>,

    #[clap(help_heading("Aligner"))]
    #[clap(long = "muscle-syntax")]
    #[clap(help = "MUSCLE command-line dialect (v3 or v5)")]
    #[clap(value_name = "SYNTAX")]
    #[clap(default_value = "v3")]
    pub muscle_syntax: MuscleSyntax,

    #[clap(help_heading("Aligner"))]
    #[clap(long = "tmp-dir")]
    #[clap(help = "Directory for aligner input scratch files [default: system temp]")]
    #[clap(value_name = "DIR")]
    #[arg(value_parser = check_dir_exists)]
    pub tmp_dir: Option<PathBuf>,

    #[clap(help_heading("Consensus"))]
    #[clap(long = "threshold")]
    #[clap(help = "Minimum fraction of non-gap symbols supporting a consensus base")]
    #[clap(value_name = "FRAC")]
    #[clap(default_value_t = DEFAULT_THRESHOLD)]
    #[arg(value_parser = ensure_unit_float)]
    pub threshold: f64,

    #[clap(help_heading("Consensus"))]
    #[clap(long = "ambiguous")]
    #[clap(help = "Symbol emitted for ambiguous alignment columns")]
    #[clap(value_name = "CHAR")]
    #[clap(default_value_t = DEFAULT_AMBIGUOUS)]
    #[arg(value_parser = ambiguous_symbol)]
    pub ambiguous: char,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(path.to_path_buf())
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_dir_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.is_dir() {
        Err(format!("Directory does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn ambiguous_symbol(s: &str) -> Result<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_graphic() && c != '-' && c != '.' && c != '>' => Ok(c),
        _ => Err(format!(
            "Ambiguous symbol must be a single printable character other than '-', '.' or '>', got: '{}'",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let contigs = dir.path().join("contigs.fa");
        std::fs::write(&contigs, ">a_1_2_0\nACGT\n").unwrap();
        let out_cons = dir.path().join("cons.fa");
        let out_msa = dir.path().join("msa");

        let cli = Cli::try_parse_from([
            "contig-msa",
            "--contigs",
            contigs.to_str().unwrap(),
            "--out_cons",
            out_cons.to_str().unwrap(),
            "--out-msa",
            out_msa.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(cli.contigs_path, contigs);
        assert_eq!(cli.out_cons, out_cons);
        assert_eq!(cli.out_msa, out_msa);
        assert_eq!(cli.num_threads, None);
        assert_eq!(cli.muscle_syntax, MuscleSyntax::V3);
        assert_eq!(cli.threshold, 0.5);
        assert_eq!(cli.ambiguous, 'N');
        assert_eq!(cli.verbosity, 0);
    }

    #[test]
    fn missing_contigs_file_is_rejected() {
        let result = Cli::try_parse_from([
            "contig-msa",
            "--contigs",
            "/no/such/contigs.fa",
            "--out_cons",
            "cons.fa",
            "--out_msa",
            "msa",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn threads_validation() {
        assert_eq!(threads_in_range("4"), Ok(4));
        assert!(threads_in_range("0").is_err());
        assert!(threads_in_range("four").is_err());
    }

    #[test]
    fn threshold_validation() {
        assert_eq!(ensure_unit_float("0.5"), Ok(0.5));
        assert!(ensure_unit_float("1.5").is_err());
        assert!(ensure_unit_float("x").is_err());
    }

    #[test]
    fn ambiguous_symbol_validation() {
        assert_eq!(ambiguous_symbol("X"), Ok('X'));
        assert!(ambiguous_symbol("NN").is_err());
        assert!(ambiguous_symbol("-").is_err());
        assert!(ambiguous_symbol("").is_err());
    }
}
