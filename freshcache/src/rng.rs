use rand::SeedableRng;

/// The pseudo-random source handed to every stochastic component.
///
/// There is no process-wide generator: each simulation creates its own
/// `SimRng` from a seed and passes it into constructors explicitly, which
/// keeps runs reproducible and lets independent simulations run in parallel.
pub type SimRng = rand_pcg::Pcg64;

/// Creates a new generator from a 64-bit seed.
pub fn seeded(seed: u64) -> SimRng {
  SimRng::seed_from_u64(seed)
}

/// Draws four hash seeds for one row of a hashed counter structure.
pub(crate) fn hash_seeds(rng: &mut SimRng) -> ahash::RandomState {
  use rand::Rng;
  ahash::RandomState::with_seeds(rng.random(), rng.random(), rng.random(), rng.random())
}
