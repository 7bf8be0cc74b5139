//! Process runtime statistics.
//!
//! Task counts come from the tokio runtime the caller runs on. Allocator
//! figures come from jemalloc, which the binary installs as the global
//! allocator; on targets without jemalloc those entries are simply absent.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};

use crate::handler::InternalMetrics;

static STARTED_AT: OnceLock<DateTime<Utc>> = OnceLock::new();

/// Record the process start time. Later calls are no-ops.
pub fn mark_started() {
    STARTED_AT.get_or_init(Utc::now);
}

/// Collect the current runtime counters and gauges.
pub fn runtime_metrics() -> InternalMetrics {
    let now = Utc::now();
    let started_at = *STARTED_AT.get_or_init(|| now);

    let mut metrics = InternalMetrics::new();

    let (active_tasks, workers) = match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let runtime = handle.metrics();
            (runtime.num_alive_tasks(), runtime.num_workers())
        }
        Err(_) => (0, 0),
    };
    metrics.counters.insert("active_tasks".into(), active_tasks as f64);
    metrics.counters.insert(
        "uptime_seconds".into(),
        (now - started_at).num_milliseconds().max(0) as f64 / 1000.0,
    );

    metrics.gauges.insert("worker_threads".into(), workers as f64);
    metrics
        .gauges
        .insert("snapshot_timestamp".into(), now.timestamp() as f64);
    metrics
        .gauges
        .insert("start_timestamp".into(), started_at.timestamp() as f64);

    allocator::record(&mut metrics);
    metrics
}

#[cfg(not(target_env = "msvc"))]
mod allocator {
    use std::ffi::{CStr, CString};
    use std::ptr;

    use tikv_jemalloc_sys::mallctl;

    use crate::handler::InternalMetrics;

    /// Byte totals, all `size_t`.
    const GAUGES: [(&CStr, &str); 6] = [
        (c"stats.allocated", "allocated"),
        (c"stats.active", "active"),
        (c"stats.metadata", "metadata"),
        (c"stats.resident", "resident"),
        (c"stats.mapped", "mapped"),
        (c"stats.retained", "retained"),
    ];

    /// Merged arena operation counts (arena index 4096 = all arenas), all
    /// `uint64_t`. Each counter is the sum of its small and large classes.
    const COUNTERS: [(&CStr, &CStr, &str); 3] = [
        (
            c"stats.arenas.4096.small.nmalloc",
            c"stats.arenas.4096.large.nmalloc",
            "allocations",
        ),
        (
            c"stats.arenas.4096.small.ndalloc",
            c"stats.arenas.4096.large.ndalloc",
            "deallocations",
        ),
        (
            c"stats.arenas.4096.small.nrequests",
            c"stats.arenas.4096.large.nrequests",
            "allocation_requests",
        ),
    ];

    pub(super) fn record(metrics: &mut InternalMetrics) {
        // jemalloc caches its statistics until the epoch advances.
        if !advance_epoch() {
            tracing::debug!("jemalloc statistics unavailable");
            return;
        }

        for (name, key) in GAUGES {
            if let Some(value) = read::<usize>(name) {
                metrics.gauges.insert(key.to_string(), value as f64);
            }
        }

        for (small, large, key) in COUNTERS {
            if let (Some(small), Some(large)) = (read::<u64>(small), read::<u64>(large)) {
                metrics
                    .counters
                    .insert(key.to_string(), small.saturating_add(large) as f64);
            }
        }

        if let Some(total) = allocated_bytes_total() {
            metrics
                .counters
                .insert("allocated_bytes_total".to_string(), total as f64);
        }
    }

    /// Cumulative bytes handed out since start.
    ///
    /// jemalloc counts allocations per size class, not bytes, so each class's
    /// `nmalloc` is weighted by its size. Small bins and large extents are
    /// summed over all arenas.
    fn allocated_bytes_total() -> Option<u64> {
        let bins = size_classes("arenas.nbins", "arenas.bin", "bins")?;
        let extents = size_classes("arenas.nlextents", "arenas.lextent", "lextents")?;
        Some(weighted_total(bins.into_iter().chain(extents)))
    }

    /// `(nmalloc, size)` for every class of one kind.
    fn size_classes(count: &str, class: &str, stats: &str) -> Option<Vec<(u64, usize)>> {
        let count = read::<u32>(&CString::new(count).ok()?)?;
        (0..count)
            .map(|j| {
                let size = CString::new(format!("{class}.{j}.size")).ok()?;
                let nmalloc = CString::new(format!("stats.arenas.4096.{stats}.{j}.nmalloc")).ok()?;
                Some((read::<u64>(&nmalloc)?, read::<usize>(&size)?))
            })
            .collect()
    }

    pub(super) fn weighted_total(classes: impl IntoIterator<Item = (u64, usize)>) -> u64 {
        classes.into_iter().fold(0u64, |total, (nmalloc, size)| {
            total.saturating_add(nmalloc.saturating_mul(size as u64))
        })
    }

    fn advance_epoch() -> bool {
        let mut epoch: u64 = 1;
        let mut len = size_of::<u64>();
        // SAFETY: "epoch" reads and writes a uint64_t; both pointers refer to
        // a live u64 and `len` is its size.
        let rc = unsafe {
            mallctl(
                c"epoch".as_ptr().cast(),
                ptr::addr_of_mut!(epoch).cast(),
                &mut len,
                ptr::addr_of_mut!(epoch).cast(),
                size_of::<u64>(),
            )
        };
        rc == 0
    }

    fn read<T: Copy + Default>(name: &CStr) -> Option<T> {
        let mut value = T::default();
        let mut len = size_of::<T>();
        // SAFETY: `value` is a writable T and `len` is its exact size; the
        // caller pairs each statistic name with its C type.
        let rc = unsafe {
            mallctl(
                name.as_ptr().cast(),
                ptr::addr_of_mut!(value).cast(),
                &mut len,
                ptr::null_mut(),
                0,
            )
        };
        (rc == 0 && len == size_of::<T>()).then_some(value)
    }
}

#[cfg(target_env = "msvc")]
mod allocator {
    use crate::handler::InternalMetrics;

    pub(super) fn record(_metrics: &mut InternalMetrics) {}
}
