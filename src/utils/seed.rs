//! Process-wide seeded RNG.
//!
//! Library randomness (tie-breaking, shuffles) draws from a single `StdRng`
//! so that one `set_seed` call makes a whole run reproducible.

use std::sync::{LazyLock, Mutex, MutexGuard};

use rand::SeedableRng;
use rand::rngs::StdRng;

struct GlobalRng {
    rng: StdRng,
    seed: Option<u64>,
}

static GLOBAL_RNG: LazyLock<Mutex<GlobalRng>> = LazyLock::new(|| {
    Mutex::new(GlobalRng {
        rng: StdRng::from_os_rng(),
        seed: None,
    })
});

fn lock() -> MutexGuard<'static, GlobalRng> {
    GLOBAL_RNG
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reseed the process-wide RNG.
pub fn set_seed(seed: u64) {
    let mut global = lock();
    global.rng = StdRng::seed_from_u64(seed);
    global.seed = Some(seed);
    tracing::debug!("Global RNG seeded with {seed}");
}

/// Seed passed to the most recent `set_seed`, if any.
pub fn current_seed() -> Option<u64> {
    lock().seed
}

/// Run `f` with exclusive access to the process-wide RNG.
pub fn with_global_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    f(&mut lock().rng)
}

/// Derive an independent RNG from the global stream.
pub fn fork_rng() -> StdRng {
    with_global_rng(|rng| StdRng::from_rng(rng))
}

#[cfg(test)]
pub(crate) static SEED_TEST_LOCK: Mutex<()> = Mutex::new(());
