//! Per-category worker pools with scoped leases.
//!
//! Script and style transformation each get their own rayon pool. Pools
//! stay warm between builds of the same [`WorkerPool`] and are reclaimed once
//! they have been idle longer than the configured timeout.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use kiln_config::WorkerConfig;
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Script,
    Style,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Script => f.write_str("script"),
            PoolKind::Style => f.write_str("style"),
        }
    }
}

struct WarmPool {
    pool: Arc<ThreadPool>,
    last_used: Instant,
    leases: usize,
}

/// Owner of the warm pools.
pub struct WorkerPool {
    config: WorkerConfig,
    pools: Mutex<FxHashMap<PoolKind, WarmPool>>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            pools: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Lease the pool for `kind`, creating it if it is not warm.
    pub fn lease(&self, kind: PoolKind) -> Result<WorkerLease<'_>> {
        self.reclaim_idle();

        let mut pools = self.pools.lock();
        let pool = match pools.get_mut(&kind) {
            Some(warm) => {
                warm.leases += 1;
                Arc::clone(&warm.pool)
            }
            None => {
                let pool = Arc::new(self.build_pool(kind)?);
                pools.insert(
                    kind,
                    WarmPool {
                        pool: Arc::clone(&pool),
                        last_used: Instant::now(),
                        leases: 1,
                    },
                );
                pool
            }
        };

        Ok(WorkerLease {
            owner: self,
            kind,
            pool,
            batch_size: self.config.parallel_jobs.max(1),
        })
    }

    fn build_pool(&self, kind: PoolKind) -> Result<ThreadPool> {
        let threads = match kind {
            PoolKind::Script => self.config.script_workers,
            PoolKind::Style => self.config.style_workers,
        }
        .max(1);
        let prefix = format!("{}-{kind}", self.config.name);
        debug!(pool = %prefix, threads, "starting worker pool");

        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| Error::WorkerPool(format!("{kind} pool: {e}")))
    }

    fn release(&self, kind: PoolKind) {
        let mut pools = self.pools.lock();
        if let Some(warm) = pools.get_mut(&kind) {
            warm.leases = warm.leases.saturating_sub(1);
            warm.last_used = Instant::now();
        }
    }

    /// Drop unleased pools idle longer than the timeout. Returns how many were dropped.
    pub fn reclaim_idle(&self) -> usize {
        let timeout = self.config.idle_timeout();
        let mut pools = self.pools.lock();
        let before = pools.len();
        pools.retain(|kind, warm| {
            let keep = warm.leases > 0 || warm.last_used.elapsed() < timeout;
            if !keep {
                debug!(pool = %kind, "reclaiming idle worker pool");
            }
            keep
        });
        before - pools.len()
    }

    /// Number of pools currently kept warm.
    pub fn warm_count(&self) -> usize {
        self.pools.lock().len()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("warm", &self.warm_count())
            .finish()
    }
}

/// Scoped access to one warm pool. Released on drop.
pub struct WorkerLease<'a> {
    owner: &'a WorkerPool,
    kind: PoolKind,
    pool: Arc<ThreadPool>,
    batch_size: usize,
}

impl WorkerLease<'_> {
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Map `f` over `items` in batches of at most `parallel_jobs`.
    ///
    /// Results come back in input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let mut out = Vec::with_capacity(items.len());
        for batch in items.chunks(self.batch_size) {
            let results: Vec<R> = self.pool.install(|| batch.par_iter().map(&f).collect());
            out.extend(results);
        }
        out
    }
}

impl Drop for WorkerLease<'_> {
    fn drop(&mut self) {
        self.owner.release(self.kind);
    }
}
