use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::{Cancellation, Result};

pub const DEFAULT_CHUNK_ROWS: usize = 10_000_000;

#[derive(Clone, Debug)]
pub struct ShuffleConfig {
    pub chunk_rows: usize,
    /// Fixed seed for reproducible output; entropy-seeded when `None`.
    pub seed: Option<u64>,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            chunk_rows: DEFAULT_CHUNK_ROWS,
            seed: None,
        }
    }
}

/// Rewrites `input` into `output` with chunk order and intra-chunk row order
/// independently permuted. Only the first `reference_rows` lines are used.
/// Returns the number of rows written. On any failure, cancellation
/// included, `output` is removed.
pub fn shuffle_rows(
    input: &Path,
    reference_rows: usize,
    output: &Path,
    cfg: &ShuffleConfig,
    cancel: &Cancellation,
) -> Result<usize> {
    let res = write_shuffled(input, reference_rows, output, cfg, cancel).and_then(|written| {
        cancel.check()?;
        Ok(written)
    });
    if res.is_err() {
        let _ = std::fs::remove_file(output);
    }
    res
}

fn write_shuffled(
    input: &Path,
    reference_rows: usize,
    output: &Path,
    cfg: &ShuffleConfig,
    cancel: &Cancellation,
) -> Result<usize> {
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let chunk_rows = cfg.chunk_rows.max(1);
    let chunks = reference_rows.div_ceil(chunk_rows);
    let mut order: Vec<usize> = (0..chunks).collect();
    order.shuffle(&mut rng);

    let mut out = BufWriter::new(File::create(output)?);
    let mut written = 0usize;

    for idx in order {
        cancel.check()?;
        let start = idx * chunk_rows;
        let take = chunk_rows.min(reference_rows - start);

        let mut chunk = read_chunk(input, start, take, cancel)?;
        chunk.shuffle(&mut rng);

        for line in &chunk {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        written += chunk.len();
    }

    out.flush()?;
    debug!(rows = written, chunks, "shuffle done");
    Ok(written)
}

fn read_chunk(path: &Path, start: usize, take: usize, cancel: &Cancellation) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::with_capacity(take);
    for (i, line) in reader.lines().skip(start).take(take).enumerate() {
        cancel.check_row(i + 1)?;
        rows.push(line?);
    }
    Ok(rows)
}
