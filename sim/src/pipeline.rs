use crate::{
    config::SimConfig,
    error::SimError,
    framework::{RunSummary, Scheduler, SignalPool},
    isa::Instruction,
    stages::{Stages, Wires},
    state::{ArchState, DataMemory, RegFile},
    trace::{TraceRecorder, DEFAULT_TRACED},
};

/// pipeline runner
///
/// Owns the scheduler, the stages and the signals between them. Build it with
/// a program, preload registers with [`Pipeline::set_reg`], then call
/// [`Pipeline::run`] with a time budget.
pub struct Pipeline {
    sched: Scheduler<Stages>,
    wires: Wires,
}

impl Pipeline {
    pub fn new(program: Vec<Instruction>, config: SimConfig) -> Result<Self, SimError> {
        let mut signals = SignalPool::default();
        let wires = Wires::new(&mut signals);
        let units = Stages::new(&wires, program, ArchState::default());
        let sched = Scheduler::new(signals, wires.clock, units, &config)?;
        Ok(Self { sched, wires })
    }

    /// Simulate `budget_ns` more nanoseconds.
    ///
    /// Returns the first fatal error under [`crate::FatalPolicy::Halt`]; the
    /// state stays inspectable and any further call fails with
    /// [`SimError::Halted`].
    pub fn run(&mut self, budget_ns: u64) -> Result<RunSummary, SimError> {
        self.sched.run_for(budget_ns)
    }

    fn state(&self) -> &ArchState {
        self.sched.units().execute.state()
    }

    fn state_mut(&mut self) -> &mut ArchState {
        self.sched.units_mut().execute.state_mut()
    }

    /// Preload a register. Index 0 and indices past the file are ignored.
    pub fn set_reg(&mut self, index: usize, value: u32) {
        self.state_mut().set_reg(index, value)
    }

    pub fn get_reg(&self, index: usize) -> Option<u32> {
        self.state().reg(index)
    }

    pub fn regs(&self) -> &RegFile {
        self.state().regs()
    }

    pub fn read_memory(&self, addr: u32) -> Result<u32, SimError> {
        self.state().mem().read(addr)
    }

    pub fn write_memory(&mut self, addr: u32, value: u32) -> Result<(), SimError> {
        self.state_mut().mem_mut().write(addr, value)
    }

    pub fn memory(&self) -> &DataMemory {
        self.state().mem()
    }

    /// Latest value of `execution_result`.
    pub fn result(&self) -> u32 {
        self.sched.signals().read(self.wires.result)
    }

    pub fn pc_next(&self) -> u32 {
        self.sched.signals().read(self.wires.pc_next)
    }

    pub fn branch_taken(&self) -> bool {
        self.sched.signals().read(self.wires.branch_taken)
    }

    /// Address of the instruction last seen by execute.
    pub fn pc_current(&self) -> u32 {
        self.sched.signals().read(self.wires.pc_current)
    }

    /// Index of the next instruction fetch will try.
    pub fn pc(&self) -> usize {
        self.sched.units().fetch.pc
    }

    pub fn program(&self) -> &[Instruction] {
        self.sched.units().fetch.program()
    }

    pub fn now_ns(&self) -> u64 {
        self.sched.now()
    }

    pub fn cycle_count(&self) -> u64 {
        self.sched.rising_edges()
    }

    /// Number of instructions fetched so far.
    pub fn fetched(&self) -> u64 {
        self.sched.units().fetch.fetched
    }

    /// Number of execute evaluations so far, failed ones included.
    pub fn executed(&self) -> u64 {
        self.sched.units().execute.executed
    }

    pub fn is_terminate(&self) -> bool {
        self.sched.halted().is_some()
    }

    /// The error that halted the pipeline, if any.
    pub fn halt_reason(&self) -> Option<&SimError> {
        self.sched.halted()
    }

    pub fn reported_errors(&self) -> &[SimError] {
        self.sched.reported()
    }

    /// Trace the default signals into `recorder`. The current values are
    /// dumped right away.
    pub fn attach_trace(&mut self, recorder: Box<dyn TraceRecorder>) -> Result<(), SimError> {
        self.attach_trace_signals(recorder, &DEFAULT_TRACED)
    }

    pub fn attach_trace_signals(
        &mut self,
        recorder: Box<dyn TraceRecorder>,
        names: &[&str],
    ) -> Result<(), SimError> {
        self.sched.attach_recorder(recorder, names)
    }

    /// Write the final timestamp and flush the trace.
    pub fn finish_trace(&mut self) -> Result<(), SimError> {
        self.sched.finish_trace()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("now_ns", &self.now_ns())
            .field("pc", &self.pc())
            .field("fetched", &self.fetched())
            .field("halted", &self.halt_reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        framework::FatalPolicy,
        isa::{funct_code, op_code},
    };

    #[test]
    fn test_harness_accessors() {
        let mut p = Pipeline::new(Vec::new(), SimConfig::default()).unwrap();
        p.set_reg(0, 5);
        p.set_reg(7, 70);
        assert_eq!(p.get_reg(0), Some(0));
        assert_eq!(p.get_reg(7), Some(70));
        assert_eq!(p.get_reg(32), None);

        p.write_memory(1023, 9).unwrap();
        assert_eq!(p.read_memory(1023), Ok(9));
        assert!(p.write_memory(1024, 1).is_err());
        assert!(p.read_memory(4096).is_err());
    }

    #[test]
    fn test_one_instruction_per_edge() {
        let prog = vec![
            Instruction::rtype(funct_code::ADD, 3, 1, 2),
            Instruction::rtype(funct_code::SUB, 3, 1, 2),
            Instruction::rtype(funct_code::OR, 3, 1, 2),
        ];
        let mut p = Pipeline::new(prog, SimConfig::default()).unwrap();
        p.set_reg(1, 0b1100);
        p.set_reg(2, 0b0101);

        p.run(1).unwrap();
        assert_eq!(p.result(), 0b10001);
        assert_eq!((p.fetched(), p.executed()), (1, 1));

        p.run(10).unwrap();
        assert_eq!(p.result(), 0b0111);
        assert_eq!(p.pc_current(), 4);

        p.run(10).unwrap();
        assert_eq!(p.result(), 0b1101);
        assert_eq!((p.fetched(), p.executed()), (3, 3));
        assert_eq!(p.pc(), 3);
    }

    #[test]
    fn test_identical_words_execute_twice() {
        let addi = Instruction::new(op_code::ADDI, 0, 0, 1, 0, 0);
        let mut p = Pipeline::new(vec![addi, addi], SimConfig::default()).unwrap();
        p.run(20).unwrap();
        assert_eq!(p.executed(), 2);
        assert_eq!(p.get_reg(0), Some(2));
    }

    #[test]
    fn test_halt_on_fetch_past_end() {
        let prog = vec![Instruction::rtype(funct_code::ADD, 3, 1, 2)];
        let mut p = Pipeline::new(prog, SimConfig::default()).unwrap();
        let err = p.run(100).unwrap_err();
        assert_eq!(err, SimError::FetchOutOfBounds { pc: 1, len: 1 });
        assert_eq!(p.now_ns(), 10);
        assert!(p.is_terminate());
        assert!(matches!(p.run(10), Err(SimError::Halted(_))));
    }

    #[test]
    fn test_report_keeps_going() {
        let prog = vec![Instruction::new(0x3f, 0, 0, 0, 0, 0)];
        let config = SimConfig::default().with_policy(FatalPolicy::Report);
        let mut p = Pipeline::new(prog, config).unwrap();
        let summary = p.run(30).unwrap();
        assert_eq!(summary.rising_edges, 3);
        assert_eq!(
            summary.errors,
            vec![
                SimError::UnsupportedOpcode(0x3f),
                SimError::FetchOutOfBounds { pc: 1, len: 1 },
            ]
        );
        // the second fetch past the end only bumps the counter
        assert_eq!(summary.repeated, 1);
        assert!(!p.is_terminate());

        let summary = p.run(1000).unwrap();
        assert!(summary.errors.is_empty());
        assert_eq!(summary.repeated, 100);
        assert_eq!(p.reported_errors().len(), 2);
    }

    #[test]
    fn test_zero_word_at_start_is_executed() {
        // the all-zero word equals the initial value of the instruction wire
        let prog = vec![Instruction::default(), Instruction::new(op_code::ADDI, 0, 0, 1, 0, 0)];
        let config = SimConfig::default().with_policy(FatalPolicy::Report);
        let mut p = Pipeline::new(prog.clone(), config).unwrap();
        let summary = p.run(10).unwrap();
        assert_eq!((p.fetched(), p.executed()), (1, 1));
        assert_eq!(summary.errors, vec![SimError::UnsupportedFunct(0)]);

        let mut p = Pipeline::new(prog, SimConfig::default()).unwrap();
        assert_eq!(p.run(10).unwrap_err(), SimError::UnsupportedFunct(0));
        assert_eq!(p.now_ns(), 0);
    }
}
