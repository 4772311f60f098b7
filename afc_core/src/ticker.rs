//! Periodic trigger threads for hosted runs.
//!
//! Spawns a thread that calls a tick closure and sleeps for the period the
//! closure returns, tracking a tick count.
//!
//! Safety: Each `Ticker` spawns exactly one thread that is automatically
//! shut down when the `Ticker` is dropped, preventing thread leaks.
use afc_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

pub struct Ticker {
    name: &'static str,
    ticks: Arc<AtomicU64>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl core::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ticker")
            .field("name", &self.name)
            .field("ticks", &self.ticks())
            .finish_non_exhaustive()
    }
}

impl Ticker {
    /// Spawn a ticker. `tick` runs once per period and returns the period to
    /// wait before the next call, so rates can change while running.
    pub fn spawn<T, C>(name: &'static str, mut tick: T, clock: C) -> Self
    where
        T: FnMut() -> Duration + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_clone = ticks.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!(ticker = name, "ticker thread received shutdown signal");
                    break;
                }
                let period = tick();
                ticks_clone.fetch_add(1, Ordering::Relaxed);

                // Check shutdown before sleep to avoid unnecessary delay
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!(ticker = name, "ticker thread exiting cleanly");
        });

        Self {
            name,
            ticks,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!(ticker = self.name, "ticker thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(
                        ticker = self.name,
                        ?e,
                        "ticker thread panicked during shutdown"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afc_traits::MonotonicClock;

    #[test]
    fn ticks_and_stops_on_drop() {
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        let t = Ticker::spawn(
            "test",
            move || {
                h.fetch_add(1, Ordering::Relaxed);
                Duration::from_micros(200)
            },
            MonotonicClock::new(),
        );
        while t.ticks() < 5 {
            std::thread::yield_now();
        }
        drop(t);
        let after = hits.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(hits.load(Ordering::Relaxed), after);
    }
}
