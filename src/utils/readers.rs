use super::Result;
use rust_htslib::faidx;
use std::path::Path;

pub fn open_contig_reader(path: &Path) -> Result<faidx::Reader> {
    let fai_path = match path.extension().and_then(|ext| ext.to_str()) {
        Some(extension) => path.with_extension(extension.to_owned() + ".fai"),
        None => path.with_extension("fai"),
    };
    if !fai_path.exists() {
        return Err(format!(
            "Contig index file not found: {}. Create it using 'samtools faidx {}'",
            fai_path.display(),
            path.display()
        ));
    }
    faidx::Reader::from_path(path).map_err(|e| e.to_string())
}

/// Returns the sequence names of an indexed FASTA in index order.
pub fn contig_names(reader: &faidx::Reader) -> Result<Vec<String>> {
    let num_seqs = reader.n_seqs() as usize;
    let mut names = Vec::with_capacity(num_seqs);
    for i in 0..num_seqs {
        let index = i32::try_from(i).map_err(|_| format!("Too many contigs in index: {}", i))?;
        names.push(reader.seq_name(index).map_err(|e| e.to_string())?);
    }
    Ok(names)
}

/// Fetches a whole contig exactly as stored in the FASTA.
pub fn fetch_contig(reader: &faidx::Reader, name: &str) -> Result<String> {
    let len = reader.fetch_seq_len(name);
    let len = usize::try_from(len)
        .map_err(|_| format!("Invalid sequence length for contig '{}'", name))?;
    if len == 0 {
        return Ok(String::new());
    }
    reader
        .fetch_seq_string(name, 0, len - 1)
        .map_err(|e| format!("Error fetching sequence for contig {}: {}", name, e))
}
