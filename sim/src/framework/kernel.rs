use std::collections::{BTreeMap, BTreeSet};

use super::{Change, ProcessSet, Sensitivity, Signal, SignalId, SignalPool};
use crate::{
    config::SimConfig,
    error::SimError,
    trace::{TraceRecorder, TraceVar},
};

/// What the scheduler does when a process raises an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Finish the current delta cycle, commit what it wrote, then stop and
    /// return the first error. Later runs fail with [`SimError::Halted`].
    #[default]
    Halt,
    /// Log the error, remember it, and keep simulating.
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    PosEdge,
    Change,
}

/// What happened during one call of [`Scheduler::run_for`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Simulated time at the end of the run.
    pub now_ns: u64,
    pub rising_edges: u64,
    pub deltas: u64,
    /// Errors reported and skipped under [`FatalPolicy::Report`]. An error
    /// equal to the one reported just before it is counted in `repeated`
    /// instead of being listed again.
    pub errors: Vec<SimError>,
    pub repeated: u64,
}

type Recorder = (Box<dyn TraceRecorder>, BTreeSet<SignalId>);

fn trace_err(e: std::io::Error) -> SimError {
    SimError::Trace(e.to_string())
}

/// Drives the clock and settles the process graph.
///
/// Each clock event starts a settling round: pending writes are committed,
/// processes sensitive to the changed signals are evaluated, and this repeats
/// (one delta cycle per repetition) until nothing changes. Only then does
/// simulated time advance to the next clock event.
pub struct Scheduler<P: ProcessSet> {
    signals: SignalPool,
    units: P,
    clock: Signal<bool>,
    half_period: u64,
    /// current simulated time in ns
    now: u64,
    next_toggle: u64,
    sensitivity: BTreeMap<SignalId, Vec<(P::Key, Trigger)>>,
    policy: FatalPolicy,
    max_deltas: u32,
    recorder: Option<Recorder>,
    /// first recorder failure, surfaced by `finish_trace`
    trace_error: Option<SimError>,
    reported: Vec<SimError>,
    repeated: u64,
    halted: Option<SimError>,
    rising_edges: u64,
    total_deltas: u64,
}

impl<P: ProcessSet> Scheduler<P> {
    /// Build a scheduler over `units`. The clock starts low and first rises
    /// at t = 0. Processes are not evaluated until something triggers them.
    pub fn new(
        signals: SignalPool,
        clock: Signal<bool>,
        units: P,
        config: &SimConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let mut sensitivity: BTreeMap<SignalId, Vec<(P::Key, Trigger)>> = BTreeMap::new();
        for (key, sens) in units.processes() {
            match sens {
                Sensitivity::PosEdge(id) => {
                    sensitivity.entry(id).or_default().push((key, Trigger::PosEdge))
                }
                Sensitivity::Change(ids) => {
                    for id in ids {
                        sensitivity.entry(id).or_default().push((key, Trigger::Change))
                    }
                }
            }
        }
        Ok(Self {
            signals,
            units,
            clock,
            half_period: config.half_period(),
            now: 0,
            next_toggle: 0,
            sensitivity,
            policy: config.fatal_policy,
            max_deltas: config.max_deltas,
            recorder: None,
            trace_error: None,
            reported: Vec::new(),
            repeated: 0,
            halted: None,
            rising_edges: 0,
            total_deltas: 0,
        })
    }

    /// Simulate every clock event in `[now, now + duration_ns)` and leave the
    /// time at `now + duration_ns`.
    pub fn run_for(&mut self, duration_ns: u64) -> Result<RunSummary, SimError> {
        if let Some(e) = &self.halted {
            return Err(SimError::Halted(Box::new(e.clone())));
        }
        let end = self.now.saturating_add(duration_ns);
        let edges_before = self.rising_edges;
        let deltas_before = self.total_deltas;
        let reported_before = self.reported.len();
        let repeated_before = self.repeated;

        while self.next_toggle < end {
            self.now = self.next_toggle;
            self.next_toggle += self.half_period;
            let level = self.signals.read(self.clock);
            self.signals.write(self.clock, !level);
            if let Err(e) = self.settle() {
                tracing::info!("simulation halted at {} ns", self.now);
                self.halted = Some(e.clone());
                return Err(e);
            }
        }
        self.now = end;

        Ok(RunSummary {
            now_ns: self.now,
            rising_edges: self.rising_edges - edges_before,
            deltas: self.total_deltas - deltas_before,
            errors: self.reported[reported_before..].to_vec(),
            repeated: self.repeated - repeated_before,
        })
    }

    /// Run delta cycles until the signals are stable.
    fn settle(&mut self) -> Result<(), SimError> {
        let mut deltas = 0u32;
        loop {
            let changes = self.signals.update();
            if changes.is_empty() {
                return Ok(());
            }
            self.record(&changes);
            if deltas >= self.max_deltas {
                return Err(SimError::DeltaLimitExceeded {
                    now: self.now,
                    max_deltas: self.max_deltas,
                });
            }
            deltas += 1;
            self.total_deltas += 1;
            if changes
                .iter()
                .any(|c| c.id == self.clock.id() && c.is_posedge())
            {
                self.rising_edges += 1;
            }

            let triggered = self.triggered(&changes);
            tracing::trace!(
                "t = {} ns, delta {}: {} changed, run {:?}",
                self.now,
                deltas,
                changes.len(),
                triggered
            );

            let mut fatal = None;
            for key in triggered {
                if let Err(e) = self.units.run(key, &mut self.signals) {
                    match self.policy {
                        FatalPolicy::Report => self.report(e),
                        FatalPolicy::Halt => {
                            tracing::error!("{}", e);
                            fatal.get_or_insert(e);
                        }
                    }
                }
            }
            if let Some(e) = fatal {
                // outputs written alongside the error stay observable
                let changes = self.signals.update();
                self.record(&changes);
                return Err(e);
            }
        }
    }

    /// Processes woken up by `changes`, in key order.
    fn triggered(&self, changes: &[Change]) -> BTreeSet<P::Key> {
        let mut keys = BTreeSet::new();
        for change in changes {
            let Some(procs) = self.sensitivity.get(&change.id) else {
                continue;
            };
            for (key, trigger) in procs {
                if *trigger == Trigger::Change || change.is_posedge() {
                    keys.insert(*key);
                }
            }
        }
        keys
    }

    fn report(&mut self, e: SimError) {
        if self.reported.last() == Some(&e) {
            tracing::debug!("{} (repeated)", e);
            self.repeated += 1;
        } else {
            tracing::error!("{}", e);
            self.reported.push(e);
        }
    }

    /// Hand committed changes to the recorder. A recorder that fails is
    /// detached, the simulation itself carries on.
    fn record(&mut self, changes: &[Change]) {
        let now = self.now;
        let Some((recorder, traced)) = &mut self.recorder else {
            return;
        };
        let r = changes
            .iter()
            .filter(|c| c.is_value_change() && traced.contains(&c.id))
            .try_for_each(|c| recorder.record_change(now, c.id, c.new));
        if let Err(e) = r {
            tracing::error!("trace output failed at {} ns, tracing stopped: {}", now, e);
            self.trace_error = Some(trace_err(e));
            self.recorder = None;
        }
    }

    /// Start tracing the named signals. Replaces any previous recorder
    /// without finalizing it.
    pub fn attach_recorder(
        &mut self,
        mut recorder: Box<dyn TraceRecorder>,
        names: &[&str],
    ) -> Result<(), SimError> {
        let mut traced = BTreeSet::new();
        let mut vars = Vec::with_capacity(names.len());
        for name in names {
            let id = self
                .signals
                .find(name)
                .ok_or_else(|| SimError::UnknownSignal(name.to_string()))?;
            traced.insert(id);
            vars.push(TraceVar {
                id,
                name: self.signals.name(id),
                initial: self.signals.value(id),
            });
        }
        recorder.declare(self.now, &vars).map_err(trace_err)?;
        self.recorder = Some((recorder, traced));
        Ok(())
    }

    /// Finalize and drop the recorder, if any. Returns the error that made
    /// an earlier recorder stop, if one did.
    pub fn finish_trace(&mut self) -> Result<(), SimError> {
        if let Some(e) = self.trace_error.take() {
            return Err(e);
        }
        if let Some((mut recorder, _)) = self.recorder.take() {
            recorder.finalize(self.now).map_err(trace_err)?;
        }
        Ok(())
    }

    pub fn signals(&self) -> &SignalPool {
        &self.signals
    }
    pub fn units(&self) -> &P {
        &self.units
    }
    pub fn units_mut(&mut self) -> &mut P {
        &mut self.units
    }
    pub fn now(&self) -> u64 {
        self.now
    }
    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }
    pub fn total_deltas(&self) -> u64 {
        self.total_deltas
    }
    /// Errors reported so far under [`FatalPolicy::Report`], without
    /// consecutive repeats.
    pub fn reported(&self) -> &[SimError] {
        &self.reported
    }
    /// Number of reported errors dropped as repeats of the previous one.
    pub fn repeated(&self) -> u64 {
        self.repeated
    }
    /// The error that stopped the simulation, if any.
    pub fn halted(&self) -> Option<&SimError> {
        self.halted.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Value;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Key {
        Counter,
        Doubler,
    }

    /// A clocked counter feeding a combinational doubler.
    struct Toy {
        clk: Signal<bool>,
        count: Signal<u32>,
        double: Signal<u32>,
        fail_at: Option<u32>,
        doubler_runs: u32,
    }

    impl ProcessSet for Toy {
        type Key = Key;

        fn processes(&self) -> Vec<(Key, Sensitivity)> {
            vec![
                (Key::Counter, Sensitivity::PosEdge(self.clk.id())),
                (Key::Doubler, Sensitivity::Change(vec![self.count.id()])),
            ]
        }

        fn run(&mut self, key: Key, signals: &mut SignalPool) -> Result<(), SimError> {
            match key {
                Key::Counter => {
                    let next = signals.read(self.count) + 1;
                    signals.write(self.count, next);
                    if self.fail_at == Some(next) {
                        return Err(SimError::UnsupportedOpcode(next));
                    }
                }
                Key::Doubler => {
                    self.doubler_runs += 1;
                    let c = signals.read(self.count);
                    signals.write(self.double, c * 2);
                }
            }
            Ok(())
        }
    }

    fn toy(fail_at: Option<u32>, policy: FatalPolicy) -> Scheduler<Toy> {
        let mut signals = SignalPool::default();
        let clk = signals.add("clock", false);
        let count = signals.add("count", 0u32);
        let double = signals.add("double", 0u32);
        let units = Toy {
            clk,
            count,
            double,
            fail_at,
            doubler_runs: 0,
        };
        let config = SimConfig::default().with_policy(policy);
        Scheduler::new(signals, clk, units, &config).unwrap()
    }

    #[test]
    fn test_settles_within_instant() {
        let mut s = toy(None, FatalPolicy::Halt);
        let summary = s.run_for(100).unwrap();
        // rising edges at 0, 10, ..., 90
        assert_eq!(summary.rising_edges, 10);
        assert_eq!(summary.now_ns, 100);
        let u = s.units();
        assert_eq!(s.signals().read(u.count), 10);
        assert_eq!(s.signals().read(u.double), 20);
        assert_eq!(u.doubler_runs, 10);
    }

    #[test]
    fn test_time_budget_is_exclusive() {
        let mut s = toy(None, FatalPolicy::Halt);
        s.run_for(10).unwrap();
        assert_eq!(s.signals().read(s.units().count), 1);
        s.run_for(1).unwrap();
        assert_eq!(s.signals().read(s.units().count), 2);
        assert_eq!(s.now(), 11);
        s.run_for(0).unwrap();
        assert_eq!(s.now(), 11);
    }

    #[test]
    fn test_nothing_runs_before_first_event() {
        let mut s = toy(None, FatalPolicy::Halt);
        s.run_for(0).unwrap();
        assert_eq!(s.units().doubler_runs, 0);
        assert_eq!(s.rising_edges(), 0);
    }

    #[test]
    fn test_halt_policy() {
        let mut s = toy(Some(3), FatalPolicy::Halt);
        let err = s.run_for(100).unwrap_err();
        assert_eq!(err, SimError::UnsupportedOpcode(3));
        assert_eq!(s.now(), 20);
        // the failing delta was committed, nothing ran after it
        assert_eq!(s.signals().read(s.units().count), 3);
        assert_eq!(s.signals().read(s.units().double), 4);
        assert_eq!(s.halted(), Some(&SimError::UnsupportedOpcode(3)));
        assert_eq!(
            s.run_for(10),
            Err(SimError::Halted(Box::new(SimError::UnsupportedOpcode(3))))
        );
    }

    #[test]
    fn test_report_policy() {
        let mut s = toy(Some(3), FatalPolicy::Report);
        let summary = s.run_for(100).unwrap();
        assert_eq!(summary.errors, vec![SimError::UnsupportedOpcode(3)]);
        assert_eq!(s.reported().len(), 1);
        assert_eq!(s.signals().read(s.units().count), 10);
        assert!(s.halted().is_none());
    }

    /// Accepts the declaration, then fails on every change.
    struct BrokenRecorder;

    impl TraceRecorder for BrokenRecorder {
        fn declare(&mut self, _: u64, _: &[TraceVar]) -> std::io::Result<()> {
            Ok(())
        }
        fn record_change(&mut self, _: u64, _: SignalId, _: Value) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
        fn finalize(&mut self, _: u64) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_trace_failure_does_not_stop_simulation() {
        let mut s = toy(Some(3), FatalPolicy::Halt);
        s.attach_recorder(Box::new(BrokenRecorder), &["clock", "count"])
            .unwrap();
        let err = s.run_for(100).unwrap_err();
        // the stage error wins, the trace error is kept for finish_trace
        assert_eq!(err, SimError::UnsupportedOpcode(3));
        assert_eq!(s.signals().read(s.units().double), 4);
        assert_eq!(s.finish_trace(), Err(SimError::Trace("disk full".into())));
        assert_eq!(s.finish_trace(), Ok(()));
    }

    struct Oscillator {
        clk: Signal<bool>,
        x: Signal<bool>,
    }

    impl ProcessSet for Oscillator {
        type Key = u8;

        fn processes(&self) -> Vec<(u8, Sensitivity)> {
            vec![(0, Sensitivity::Change(vec![self.clk.id(), self.x.id()]))]
        }

        fn run(&mut self, _key: u8, signals: &mut SignalPool) -> Result<(), SimError> {
            let x = signals.read(self.x);
            signals.write(self.x, !x);
            Ok(())
        }
    }

    #[test]
    fn test_delta_limit() {
        let mut signals = SignalPool::default();
        let clk = signals.add("clock", false);
        let x = signals.add("x", false);
        let config = SimConfig {
            max_deltas: 16,
            ..Default::default()
        };
        let mut s = Scheduler::new(signals, clk, Oscillator { clk, x }, &config).unwrap();
        assert_eq!(
            s.run_for(10),
            Err(SimError::DeltaLimitExceeded {
                now: 0,
                max_deltas: 16
            })
        );
    }

    #[test]
    fn test_invalid_period() {
        for period in [0, 1, 7] {
            let config = SimConfig {
                clock_period_ns: period,
                ..Default::default()
            };
            assert_eq!(config.validate(), Err(SimError::InvalidClockPeriod(period)));
        }
        let mut signals = SignalPool::default();
        let clk = signals.add("clock", false);
        let x = signals.add("x", false);
        let config = SimConfig {
            clock_period_ns: 3,
            ..Default::default()
        };
        assert!(Scheduler::new(signals, clk, Oscillator { clk, x }, &config).is_err());
    }
}
