use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::{RunContext, SimulationCallbacks};
use crate::sim::analysis::{AnalysisManager, RunSummary};
use crate::sim::config::RunConfig;
use crate::sim::hits::HitsOfEvent;
use crate::sim::primary::ParticleGun;
use crate::sim::sensitive::{SdManager, Step};
use crate::sim::transport::{StepSink, StraightLineTransport, TransportEngine};

/// Result of [`RunManager::beam_on`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub events: usize,
    /// Summary of the merged run, when the callbacks produced one.
    pub summary: Option<RunSummary>,
    pub worker_summaries: Vec<RunSummary>,
    /// Files written by the master and the workers.
    pub files: Vec<PathBuf>,
}

/// Feeds the steps of one event to the sensitive detectors.
struct EventSink<'a> {
    sd: &'a SdManager,
    event: &'a mut HitsOfEvent,
}

impl StepSink for EventSink<'_> {
    fn on_step(&mut self, step: &Step) -> Result<()> {
        self.sd.process_step(step, self.event)
    }
}

struct WorkerResult {
    events: usize,
    analysis: AnalysisManager,
    summary: Option<RunSummary>,
}

/// Drives a run: geometry on the master, events on rayon workers, results
/// merged back on the master.
///
/// `factory` creates a fresh set of callbacks for the master and for each
/// worker.
pub struct RunManager<F>
where
    F: Fn() -> Box<dyn SimulationCallbacks> + Sync,
{
    config: RunConfig,
    factory: F,
    engine: Box<dyn TransportEngine>,
}

impl<F> RunManager<F>
where
    F: Fn() -> Box<dyn SimulationCallbacks> + Sync,
{
    /// Run manager using straight-line transport.
    pub fn new(config: RunConfig, factory: F) -> Self {
        let engine = Box::new(StraightLineTransport::new(config.run.max_step));
        Self {
            config,
            factory,
            engine,
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn TransportEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Simulates `n_events` events and returns what was produced.
    pub fn beam_on(&self, n_events: usize) -> Result<RunOutcome> {
        self.config.validate()?;
        let start = Instant::now();

        let mut master = RunContext::new(self.config.clone());
        let mut callbacks = (self.factory)();
        info!("Building geometry ({})", callbacks.name());
        let tree = callbacks.build_geometry(&mut master)?;
        debug!("\n{tree}");
        master.set_geometry(tree);
        callbacks.begin_of_run(&mut master)?;

        let ranges = split_events(n_events, self.config.run.threads);
        info!(
            "Starting run of {n_events} events on {} worker(s), {} transport",
            ranges.len(),
            self.engine.name()
        );
        let results = ranges
            .into_par_iter()
            .enumerate()
            .map(|(t, (first, count))| self.run_worker(&master, t, first, count))
            .collect::<Result<Vec<_>>>()?;

        let mut events = 0;
        let mut worker_summaries = Vec::new();
        let mut files = Vec::new();
        for r in &results {
            master
                .analysis
                .merge(&r.analysis)
                .context("Cannot merge worker results")?;
            events += r.events;
            files.extend(r.analysis.written_files().iter().cloned());
            if let Some(s) = &r.summary {
                worker_summaries.push(s.clone());
            }
        }
        callbacks.end_of_run(&mut master)?;
        files.extend(master.analysis.written_files().iter().cloned());

        info!(
            "Run finished: {events} events in {:.3} s",
            start.elapsed().as_secs_f64()
        );
        Ok(RunOutcome {
            events,
            summary: master.summary.take(),
            worker_summaries,
            files,
        })
    }

    fn run_worker(&self, master: &RunContext, thread: usize, first: usize, count: usize) -> Result<WorkerResult> {
        let mut ctx = master.worker(thread);
        let mut callbacks = (self.factory)();
        callbacks.construct_sd_and_field(&mut ctx)?;
        if ctx.field.is_active() && !self.engine.supports_field() {
            warn!(
                "Thread {thread}: {} transport ignores the magnetic field",
                self.engine.name()
            );
        }
        callbacks.begin_of_run(&mut ctx)?;

        let geometry = ctx.shared_geometry()?;
        let world = geometry.logical_of(geometry.world()?);
        let upstream_z = -world.solid.half_extents()[2];
        let seed = worker_seed(self.config.run.seed, thread);
        let mut gun = ParticleGun::from_config(&ctx.config.gun, upstream_z, seed)?;
        debug!("Thread {thread}: events {first}..{} seed {seed}", first + count);

        for event_id in first..first + count {
            let mut event = ctx.sd.begin_event(event_id);
            callbacks.begin_of_event(&event, &mut ctx)?;
            let primary = gun.generate();
            {
                let mut sink = EventSink {
                    sd: &ctx.sd,
                    event: &mut event,
                };
                self.engine
                    .transport(&primary, &geometry, &ctx.materials, &mut sink)
                    .with_context(|| format!("Event {event_id}"))?;
            }
            callbacks.end_of_event(&event, &mut ctx)?;
        }
        callbacks.end_of_run(&mut ctx)?;

        Ok(WorkerResult {
            events: count,
            analysis: ctx.analysis,
            summary: ctx.summary,
        })
    }
}

/// Splits `n_events` into contiguous `(first, count)` ranges, one per
/// worker. Never returns more ranges than events, and at least one.
pub fn split_events(n_events: usize, threads: usize) -> Vec<(usize, usize)> {
    let workers = threads.max(1).min(n_events.max(1));
    let base = n_events / workers;
    let extra = n_events % workers;
    let mut first = 0;
    (0..workers)
        .map(|t| {
            let count = base + usize::from(t < extra);
            let range = (first, count);
            first += count;
            range
        })
        .collect()
}

/// Per-worker seed derived from the run seed (splitmix64 finaliser).
fn worker_seed(seed: u64, thread: usize) -> u64 {
    let mut z = seed.wrapping_add((thread as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_events() {
        assert_eq!(split_events(10, 3), vec![(0, 4), (4, 3), (7, 3)]);
        assert_eq!(split_events(2, 4), vec![(0, 1), (1, 1)]);
        assert_eq!(split_events(0, 4), vec![(0, 0)]);
        assert_eq!(split_events(5, 0), vec![(0, 5)]);
    }

    #[test]
    fn test_worker_seeds_differ() {
        assert_ne!(worker_seed(1, 0), worker_seed(1, 1));
        assert_eq!(worker_seed(7, 3), worker_seed(7, 3));
    }

    #[test]
    fn test_invalid_config_rejected_before_geometry() {
        let mut config = RunConfig::default();
        config.run.threads = 0;
        let rm = RunManager::new(config, || -> Box<dyn SimulationCallbacks> {
            Box::new(crate::sim::actions::DiodeActions::new())
        });
        assert!(rm.beam_on(1).is_err());
    }
}
