//! External multiple sequence aligner invocation.
//!
use crate::utils::Result;
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
};

/// Environment variable consulted for the aligner location when no path is given.
pub const MUSCLE_ENV: &str = "MUSCLE_EXE";
const MUSCLE_BINARY: &str = "muscle";
const STDERR_TAIL_LINES: usize = 5;

/// Aligns the sequences of a FASTA file and writes the aligned FASTA to `output`.
pub trait MsaAligner: Send + Sync {
    fn align(&self, input: &Path, output: &Path) -> Result<()>;

    fn name(&self) -> String;
}

/// Command-line dialect of the MUSCLE binary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MuscleSyntax {
    /// MUSCLE 3.x: `-in <fasta> -out <fasta>`
    V3,
    /// MUSCLE 5.x: `-align <fasta> -output <fasta>`
    V5,
}

impl FromStr for MuscleSyntax {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "v3" | "3" => Ok(MuscleSyntax::V3),
            "v5" | "5" => Ok(MuscleSyntax::V5),
            _ => Err(format!("Invalid MUSCLE syntax '{}': must be v3 or v5", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Muscle {
    exe: PathBuf,
    syntax: MuscleSyntax,
}

impl Muscle {
    pub fn new(exe: impl Into<PathBuf>, syntax: MuscleSyntax) -> Self {
        Self {
            exe: exe.into(),
            syntax,
        }
    }

    /// Locates the MUSCLE binary: an explicit path wins, otherwise `muscle` is searched on `PATH`.
    pub fn resolve(explicit: Option<PathBuf>, syntax: MuscleSyntax) -> Result<Self> {
        let exe = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(format!("Aligner binary does not exist: {}", path.display()));
                }
                path
            }
            None => which::which(MUSCLE_BINARY).map_err(|_| {
                format!(
                    "{} binary not found on PATH. Install MUSCLE or point --muscle / {} to it",
                    MUSCLE_BINARY, MUSCLE_ENV
                )
            })?,
        };
        Ok(Self::new(exe, syntax))
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.exe);
        match self.syntax {
            MuscleSyntax::V3 => {
                cmd.arg("-in")
                    .arg(input)
                    .arg("-out")
                    .arg(output)
                    .arg("-quiet");
            }
            MuscleSyntax::V5 => {
                cmd.arg("-align").arg(input).arg("-output").arg(output);
            }
        }
        cmd
    }
}

impl MsaAligner for Muscle {
    fn align(&self, input: &Path, output: &Path) -> Result<()> {
        // A leftover alignment from an earlier run must not pass for this one
        if output.exists() {
            fs::remove_file(output).map_err(|e| {
                format!("Failed to remove stale alignment {}: {}", output.display(), e)
            })?;
        }

        let mut cmd = self.command(input, output);
        log::trace!("Executing: {:?}", cmd);
        let result = cmd
            .output()
            .map_err(|e| format!("Failed to run {}: {}", self.exe.display(), e))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(format!(
                "{} exited with {}: {}",
                self.exe.display(),
                result.status,
                tail.trim()
            ));
        }
        if !output.exists() {
            return Err(format!(
                "{} finished but did not write {}",
                self.exe.display(),
                output.display()
            ));
        }
        Ok(())
    }

    fn name(&self) -> String {
        format!("{} ({:?})", self.exe.display(), self.syntax)
    }
}
