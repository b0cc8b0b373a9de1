//! CPU cache eviction between timed trials.

use log::debug;
use roofline_core::{Error, Result};
use std::hint::black_box;
use std::thread;

const CACHE_LINE: usize = 64;

/// Evict CPU caches on every core by touching a `size_mb` MiB buffer per
/// core, one write per cache line.
///
/// Returns only after every worker has finished. `size_mb` should exceed
/// the last-level cache.
pub fn flush_cpu_caches(size_mb: usize) -> Result<()> {
    let workers = thread::available_parallelism()
        .map_err(|e| Error::Other(format!("Unable to determine CPU core count: {}", e)))?
        .get();

    debug!("flushing caches: {} workers × {} MiB", workers, size_mb);

    thread::scope(|scope| -> Result<()> {
        let handles = (0..workers)
            .map(|i| {
                thread::Builder::new()
                    .name(format!("cache-flush-{}", i))
                    .spawn_scoped(scope, move || touch_buffer(size_mb))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        for handle in handles {
            handle
                .join()
                .map_err(|_| Error::Other("cache flush worker panicked".into()))?;
        }
        Ok(())
    })
}

/// Touch every cache line of a freshly allocated buffer. Returns the
/// checksum so the writes cannot be optimized away.
fn touch_buffer(size_mb: usize) -> u64 {
    let size = size_mb * 1024 * 1024;
    let mut buf = vec![0u8; size];

    let mut checksum = 0u64;
    for i in (0..size).step_by(CACHE_LINE) {
        buf[i] = buf[i].wrapping_add(1);
        checksum = checksum.wrapping_add(buf[i] as u64);
    }
    black_box(&buf);
    black_box(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_buffer_writes_every_line() {
        // 1 MiB / 64 B lines
        assert_eq!(touch_buffer(1), 16_384);
        assert_eq!(touch_buffer(0), 0);
    }

    #[test]
    fn test_flush_joins_all_workers() {
        flush_cpu_caches(1).unwrap();
    }
}
