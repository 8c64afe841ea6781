//! Random number generation plans.

use crate::constants::DEFAULT_RAND_SEED;
use crate::handle::PlanHandle;
use crate::types::Algorithm;

use super::{impl_plan_kind, AlgorithmPlan};

/// Seed state for a generator. Holds no device storage.
#[derive(Debug)]
pub struct RandPlan {
    seed: u32,
}

impl RandPlan {
    pub(crate) fn new() -> Self {
        Self {
            seed: DEFAULT_RAND_SEED,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
    }

    /// Hand the current seed to a generator run and store the seed the next
    /// run starts from.
    pub fn advance_seed(&mut self, step: impl FnOnce(u32) -> u32) -> u32 {
        let current = self.seed;
        self.seed = step(current);
        current
    }
}

impl AlgorithmPlan for RandPlan {
    const ALGORITHM: Algorithm = Algorithm::Rand;

    impl_plan_kind!(Rand);

    fn scratch_bytes(&self) -> usize {
        0
    }

    fn release(&mut self) -> Option<PlanHandle> {
        None
    }
}
