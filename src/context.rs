//! Provides the execution context that is passed explicitly through building and training.
//!
//! There is no process-wide session. Everything that would otherwise be global
//! state (the random generator used for weight initialization and shuffling)
//! lives in a [Context][1] owned by the caller.
//!
//! [1]: ./struct.Context.html
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// The phase a forward pass is executed in.
///
/// Only stages with batch dependent behaviour (normalization) care about the phase.
pub enum Phase {
    /// Use batch statistics and allow running statistics to be updated.
    Train,
    /// Use the stored running statistics; never mutate anything.
    Test,
}

#[derive(Debug, Clone)]
/// Explicit execution context for building and training pipelines.
pub struct Context {
    rng: StdRng,
}

impl Context {
    /// Create a reproducible context from a seed.
    pub fn seeded(seed: u64) -> Context {
        Context {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a context seeded from the operating system's entropy source.
    pub fn from_entropy() -> Context {
        Context {
            rng: StdRng::from_entropy(),
        }
    }

    /// The random generator used for weight fillers and shuffling.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::seeded(0)
    }
}
