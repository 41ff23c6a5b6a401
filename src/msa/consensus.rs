use crate::utils::Result;
use bio::io::fasta;
use std::path::Path;

pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_AMBIGUOUS: char = 'N';

fn is_gap(symbol: u8) -> bool {
    symbol == b'-' || symbol == b'.'
}

/// Column-majority consensus of an alignment.
///
/// A column yields its most frequent non-gap symbol when that symbol is the
/// unique maximum and covers at least `threshold` of the non-gap symbols in
/// the column. Ties, low-support columns and all-gap columns yield
/// `ambiguous`, as does a winning symbol outside ASCII. The result has one
/// character per column of the longest row.
pub fn majority_consensus(rows: &[&[u8]], threshold: f64, ambiguous: u8) -> String {
    let aln_len = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let mut consensus = Vec::with_capacity(aln_len);
    let mut counts = [0usize; 256];

    for col in 0..aln_len {
        counts.iter_mut().for_each(|c| *c = 0);
        let mut num_symbols = 0;
        for row in rows {
            if let Some(&symbol) = row.get(col) {
                if !is_gap(symbol) {
                    counts[symbol as usize] += 1;
                    num_symbols += 1;
                }
            }
        }

        let max_count = counts.iter().copied().max().unwrap_or(0);
        let mut winners = counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0 && count == max_count);
        let symbol = match (winners.next(), winners.next()) {
            (Some((symbol, _)), None)
                if max_count as f64 / num_symbols as f64 >= threshold =>
            {
                symbol as u8
            }
            _ => ambiguous,
        };
        // Keep one character per column
        let symbol = if symbol.is_ascii() { symbol } else { ambiguous };
        consensus.push(symbol);
    }

    consensus.into_iter().map(char::from).collect()
}

/// Reads an aligned FASTA, checking that all rows share one length.
pub fn read_alignment(path: &Path) -> Result<Vec<fasta::Record>> {
    let reader = fasta::Reader::from_file(path)
        .map_err(|e| format!("Failed to open alignment {}: {}", path.display(), e))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| format!("Invalid alignment {}: {}", path.display(), e))?;
        rows.push(record);
    }

    let Some(first) = rows.first() else {
        return Err(format!("Alignment {} has no sequences", path.display()));
    };
    let aln_len = first.seq().len();
    if let Some(row) = rows.iter().find(|row| row.seq().len() != aln_len) {
        return Err(format!(
            "Sequences in alignment {} differ in length: {} has {} columns, expected {}",
            path.display(),
            row.id(),
            row.seq().len(),
            aln_len
        ));
    }
    Ok(rows)
}

pub fn alignment_consensus(path: &Path, threshold: f64, ambiguous: u8) -> Result<String> {
    let records = read_alignment(path)?;
    let rows: Vec<&[u8]> = records.iter().map(|r| r.seq()).collect();
    Ok(majority_consensus(&rows, threshold, ambiguous))
}
