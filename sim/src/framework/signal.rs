use std::marker::PhantomData;

use crate::isa::Instruction;

/// Identifies a signal inside a [`SignalPool`], regardless of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId(usize);

/// A type-erased snapshot of a signal value. Used by the scheduler for edge
/// detection and by trace recorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bit(bool),
    Word(u32),
    Inst(Instruction),
}

impl Value {
    /// Width of the value in bits when dumped to a waveform.
    pub fn width(&self) -> u32 {
        match self {
            Value::Bit(_) => 1,
            Value::Word(_) | Value::Inst(_) => 32,
        }
    }
}

/// Which typed lane of the pool a signal lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Bit,
    Word,
    Inst,
}

/// Storage for one signal: the committed value and, during a delta cycle,
/// the value written by a process but not yet visible to readers.
#[derive(Debug)]
pub struct Slot<T> {
    name: &'static str,
    current: T,
    pending: Option<T>,
    /// every write is an event, even one that keeps the value
    buffered: bool,
}

/// Types that can be carried by a signal.
pub trait SignalValue: Copy + PartialEq + std::fmt::Debug + 'static {
    const LANE: Lane;
    fn lane(pool: &SignalPool) -> &[Slot<Self>];
    fn lane_mut(pool: &mut SignalPool) -> &mut Vec<Slot<Self>>;
    fn to_value(self) -> Value;
}

impl SignalValue for bool {
    const LANE: Lane = Lane::Bit;
    fn lane(pool: &SignalPool) -> &[Slot<Self>] {
        &pool.bits
    }
    fn lane_mut(pool: &mut SignalPool) -> &mut Vec<Slot<Self>> {
        &mut pool.bits
    }
    fn to_value(self) -> Value {
        Value::Bit(self)
    }
}

impl SignalValue for u32 {
    const LANE: Lane = Lane::Word;
    fn lane(pool: &SignalPool) -> &[Slot<Self>] {
        &pool.words
    }
    fn lane_mut(pool: &mut SignalPool) -> &mut Vec<Slot<Self>> {
        &mut pool.words
    }
    fn to_value(self) -> Value {
        Value::Word(self)
    }
}

impl SignalValue for Instruction {
    const LANE: Lane = Lane::Inst;
    fn lane(pool: &SignalPool) -> &[Slot<Self>] {
        &pool.insts
    }
    fn lane_mut(pool: &mut SignalPool) -> &mut Vec<Slot<Self>> {
        &mut pool.insts
    }
    fn to_value(self) -> Value {
        Value::Inst(self)
    }
}

/// A typed handle to a signal. Handles are cheap to copy and are what the
/// stages hold as their input and output ports.
#[derive(Debug)]
pub struct Signal<T> {
    id: SignalId,
    slot: usize,
    _ty: PhantomData<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Signal<T> {}

impl<T> Signal<T> {
    pub fn id(&self) -> SignalId {
        self.id
    }
}

/// A committed value change of one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub id: SignalId,
    pub prev: Value,
    pub new: Value,
}

impl Change {
    /// Whether this change is a low to high transition of a bit signal.
    pub fn is_posedge(&self) -> bool {
        matches!((self.prev, self.new), (Value::Bit(false), Value::Bit(true)))
    }

    /// False for a buffer write that kept the value.
    pub fn is_value_change(&self) -> bool {
        self.prev != self.new
    }
}

/// All signals of a circuit.
///
/// Writes made during a delta cycle are pending until [`SignalPool::update`]
/// commits them, so every process evaluated in the same delta sees the same
/// values.
#[derive(Debug, Default)]
pub struct SignalPool {
    bits: Vec<Slot<bool>>,
    words: Vec<Slot<u32>>,
    insts: Vec<Slot<Instruction>>,
    /// (lane, slot) of every signal, indexed by [`SignalId`]
    index: Vec<(Lane, usize)>,
    /// signals written since the last update, in write order
    dirty: Vec<SignalId>,
}

fn commit<T: SignalValue>(slot: &mut Slot<T>) -> Option<(Value, Value)> {
    let new = slot.pending.take()?;
    if new == slot.current && !slot.buffered {
        return None;
    }
    let prev = std::mem::replace(&mut slot.current, new);
    Some((prev.to_value(), new.to_value()))
}

impl SignalPool {
    /// Declare a new signal with its initial value.
    pub fn add<T: SignalValue>(&mut self, name: &'static str, init: T) -> Signal<T> {
        self.add_slot(name, init, false)
    }

    /// Declare a signal for which every committed write is an event, even
    /// when it writes the value the signal already holds.
    pub fn add_buffer<T: SignalValue>(&mut self, name: &'static str, init: T) -> Signal<T> {
        self.add_slot(name, init, true)
    }

    fn add_slot<T: SignalValue>(
        &mut self,
        name: &'static str,
        init: T,
        buffered: bool,
    ) -> Signal<T> {
        let lane = T::lane_mut(self);
        let slot = lane.len();
        lane.push(Slot {
            name,
            current: init,
            pending: None,
            buffered,
        });
        let id = SignalId(self.index.len());
        self.index.push((T::LANE, slot));
        Signal {
            id,
            slot,
            _ty: PhantomData,
        }
    }

    /// The committed value of a signal.
    pub fn read<T: SignalValue>(&self, sig: Signal<T>) -> T {
        T::lane(self)[sig.slot].current
    }

    /// Schedule a new value. The last write in a delta cycle wins.
    pub fn write<T: SignalValue>(&mut self, sig: Signal<T>, value: T) {
        let slot = &mut T::lane_mut(self)[sig.slot];
        if slot.pending.replace(value).is_none() {
            self.dirty.push(sig.id);
        }
    }

    /// Commit all pending writes and return the signals whose value actually
    /// changed. Writing the current value again does not count as a change,
    /// except on buffer signals, where the change has `prev == new`.
    pub fn update(&mut self) -> Vec<Change> {
        let dirty = std::mem::take(&mut self.dirty);
        let mut changes = Vec::with_capacity(dirty.len());
        for id in dirty {
            let (lane, slot) = self.index[id.0];
            let committed = match lane {
                Lane::Bit => commit(&mut self.bits[slot]),
                Lane::Word => commit(&mut self.words[slot]),
                Lane::Inst => commit(&mut self.insts[slot]),
            };
            if let Some((prev, new)) = committed {
                changes.push(Change { id, prev, new });
            }
        }
        changes
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Committed value of any signal, type-erased.
    pub fn value(&self, id: SignalId) -> Value {
        let (lane, slot) = self.index[id.0];
        match lane {
            Lane::Bit => self.bits[slot].current.to_value(),
            Lane::Word => self.words[slot].current.to_value(),
            Lane::Inst => self.insts[slot].current.to_value(),
        }
    }

    pub fn name(&self, id: SignalId) -> &'static str {
        let (lane, slot) = self.index[id.0];
        match lane {
            Lane::Bit => self.bits[slot].name,
            Lane::Word => self.words[slot].name,
            Lane::Inst => self.insts[slot].name,
        }
    }

    /// Look a signal up by the name it was declared with.
    pub fn find(&self, name: &str) -> Option<SignalId> {
        (0..self.index.len())
            .map(SignalId)
            .find(|id| self.name(*id) == name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_is_pending_until_update() {
        let mut pool = SignalPool::default();
        let a = pool.add("a", 1u32);
        pool.write(a, 2);
        assert_eq!(pool.read(a), 1);
        let changes = pool.update();
        assert_eq!(pool.read(a), 2);
        assert_eq!(
            changes,
            vec![Change {
                id: a.id(),
                prev: Value::Word(1),
                new: Value::Word(2)
            }]
        );
    }

    #[test]
    fn test_same_value_is_not_a_change() {
        let mut pool = SignalPool::default();
        let a = pool.add("a", 7u32);
        let b = pool.add("b", false);
        pool.write(a, 7);
        pool.write(b, true);
        let changes = pool.update();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, b.id());
        assert!(changes[0].is_posedge());
        assert!(!pool.has_pending());
    }

    #[test]
    fn test_buffer_notifies_on_same_value() {
        let mut pool = SignalPool::default();
        let a = pool.add_buffer("a", 5u32);
        assert!(pool.update().is_empty());
        pool.write(a, 5);
        let changes = pool.update();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].prev, changes[0].new);
        assert!(!changes[0].is_value_change());
    }

    #[test]
    fn test_last_write_wins() {
        let mut pool = SignalPool::default();
        let a = pool.add("a", 0u32);
        pool.write(a, 1);
        pool.write(a, 0);
        assert!(pool.update().is_empty());
        pool.write(a, 1);
        pool.write(a, 3);
        assert_eq!(pool.update().len(), 1);
        assert_eq!(pool.read(a), 3);
    }

    #[test]
    fn test_lookup() {
        let mut pool = SignalPool::default();
        let _ = pool.add("clock", false);
        let inst = pool.add("inst", Instruction::default());
        assert_eq!(pool.find("inst"), Some(inst.id()));
        assert_eq!(pool.find("nope"), None);
        assert_eq!(pool.name(inst.id()), "inst");
        assert_eq!(pool.value(inst.id()), Value::Inst(Instruction::default()));
        assert_eq!(pool.len(), 2);
    }
}
