//! Repeated random-window sampling.
//!
//! The `Sampler` replays many random windows of one series in parallel, building a fresh
//! strategy for every run, and collects every [`SimulationResult`].

use rand::{SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use tracing::info;

use crate::{
    engine::{SimulationResult, Simulator, Window},
    errors::Result,
    strategy::Strategy,
};

/// Runs `runs` simulations over random windows of `window` ticks.
#[derive(Debug, Clone)]
pub struct Sampler<'a> {
    simulator: &'a Simulator,
    window: usize,
    runs: usize,
    seed: Option<u64>,
}

impl<'a> Sampler<'a> {
    /// Creates a sampler of `runs` windows of `window` ticks each.
    pub fn new(simulator: &'a Simulator, window: usize, runs: usize) -> Self {
        Self {
            simulator,
            window,
            runs,
            seed: None,
        }
    }

    /// Makes window offsets reproducible: run `k` draws from a generator seeded with `seed + k`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Runs every simulation, each with a strategy from `factory`.
    ///
    /// Results are in run order. The first failing run fails the whole batch.
    pub fn run<S, F>(&self, factory: F) -> Result<Vec<SimulationResult>>
    where
        S: Strategy,
        F: Fn() -> Result<S> + Sync,
    {
        let num_cpus = num_cpus::get();
        let runs = (0..self.runs as u64).collect::<Vec<_>>();
        let chunk_size = runs.len().div_ceil(num_cpus).max(1);

        let results = runs
            .par_chunks(chunk_size)
            .map::<_, Result<_>>(|chunk| {
                let mut local_results = Vec::with_capacity(chunk.len());
                for &run in chunk {
                    let mut rng = match self.seed {
                        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(run)),
                        None => StdRng::from_rng(&mut rand::rng()),
                    };
                    let mut strategy = factory()?;
                    let result = self
                        .simulator
                        .run_with_rng(Window::Random(self.window), &mut strategy, &mut rng)?;
                    local_results.push(result);
                }
                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect::<Vec<_>>())?;

        info!(
            symbol = self.simulator.series().symbol(),
            runs = results.len(),
            window = self.window,
            "sampling done"
        );
        Ok(results)
    }
}
