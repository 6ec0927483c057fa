//! Operation log writers and generators

use super::{Operation, OperationRecord};
use crate::config::workload::KeyFormat;
use crate::config::GenerateConfig;
use crate::distribution::cache::TableCache;
use crate::distribution::{derive_seed, Distribution, DistributionTemplate};
use crate::error::BenchError;
use crate::Result;
use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `records` to `path`, replacing any existing file
pub fn write_records(path: &Path, records: &[OperationRecord]) -> Result<()> {
    write_with(path, |out| {
        for record in records {
            out.write_all(&record.to_bytes())?;
        }
        Ok(())
    })
}

/// Write raw native-endian keys to `path`, replacing any existing file
pub fn write_keys(path: &Path, keys: &[u64]) -> Result<()> {
    write_with(path, |out| {
        for key in keys {
            out.write_all(&key.to_ne_bytes())?;
        }
        Ok(())
    })
}

fn write_with<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> std::io::Result<()>,
{
    let what = || format!("write {}", path.display());

    let file = File::create(path).map_err(|e| BenchError::resource(what(), e))?;
    let mut out = BufWriter::new(&file);
    body(&mut out).map_err(|e| BenchError::resource(what(), e))?;
    out.flush().map_err(|e| BenchError::resource(what(), e))?;
    drop(out);
    file.sync_all().map_err(|e| BenchError::resource(what(), e))?;

    tracing::info!(path = %path.display(), "wrote log");
    Ok(())
}

/// Draw `count` keys from `dist`
pub fn generate_keys(dist: &mut dyn Distribution, count: usize) -> Vec<u64> {
    (0..count).map(|_| dist.next_key()).collect()
}

/// Draw `count` records: `get` with probability `read_ratio`, else `insert`
///
/// Inserted values equal their key.
pub fn generate_records<R: Rng + ?Sized>(
    dist: &mut dyn Distribution,
    count: usize,
    read_ratio: f64,
    rng: &mut R,
) -> Vec<OperationRecord> {
    (0..count)
        .map(|_| {
            let key = dist.next_key();
            let op = if rng.gen::<f64>() < read_ratio {
                Operation::Get { key }
            } else {
                Operation::Insert { key, value: key }
            };
            OperationRecord::from(op)
        })
        .collect()
}

/// Sample `count` operations per `generate` and write them to its output
///
/// Returns the number of entries written.
pub fn generate_log(generate: &GenerateConfig, count: u64, seed: u64) -> Result<usize> {
    let output = generate
        .output
        .as_deref()
        .ok_or_else(|| BenchError::config("generate mode needs an output path"))?;
    let count = usize::try_from(count)
        .map_err(|_| BenchError::config(format!("count {} does not fit in memory", count)))?;

    let mut cache = TableCache::new();
    let template = DistributionTemplate::build(&generate.distribution, &mut cache, seed)
        .with_context(|| format!("Failed to build {}", generate.distribution))?;
    let mut dist = template.instantiate(derive_seed(seed, 1));

    tracing::info!(
        path = %output.display(),
        format = %generate.key_format,
        distribution = %generate.distribution,
        count,
        "generating log"
    );

    match generate.key_format {
        KeyFormat::Keys => write_keys(output, &generate_keys(dist.as_mut(), count))?,
        KeyFormat::Records => {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(derive_seed(seed, 2));
            let records = generate_records(dist.as_mut(), count, generate.get_ratio, &mut rng);
            write_records(output, &records)?;
        }
    }
    Ok(count)
}
