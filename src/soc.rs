use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bus::DataBus;
use crate::cpu::{ExecutionEngine, Retired};
use crate::decode::disasm;
use crate::rom::InstructionRom;
use crate::{snapshot, Result};

pub const PIN_OUT0: u8 = 1 << 0;
pub const PIN_OUT1: u8 = 1 << 1;
pub const PIN_ACTIVE: u8 = 1 << 2;
pub const PIN_FETCH: u8 = 1 << 3;

/// One retired instruction as kept in the bounded trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetireRecord {
    pub index: u64,
    pub pc: u32,
    pub word: u32,
    pub asm: String,
    pub pc_after: u32,
}

/// The whole machine: engine, instruction store, data-side bus.
///
/// `tick(reset)` advances one clock edge. The machine powers up held in
/// reset; the first `tick(false)` starts the fetch of word 0. There is no
/// halt state: the engine fetches forever.
#[derive(Debug, Clone)]
pub struct Soc {
    pub cpu: ExecutionEngine,
    pub rom: InstructionRom,
    pub bus: DataBus,
    in_reset: bool,
    cycle_count: u64,
    instr_count: u64,
    trace: Option<VecDeque<RetireRecord>>,
    trace_capacity: usize,
}

impl Soc {
    pub fn new(program: &[u32]) -> Result<Self> {
        Ok(Self {
            cpu: ExecutionEngine::new(),
            rom: InstructionRom::new(program)?,
            bus: DataBus::new(),
            in_reset: true,
            cycle_count: 0,
            instr_count: 0,
            trace: None,
            trace_capacity: 0,
        })
    }

    /// Advance one clock edge with the given reset level.
    ///
    /// While `reset` is high the engine is held fetching word 0, the
    /// register file and the output register are cleared, and nothing is
    /// counted. RAM contents survive; only initialization fills them.
    pub fn tick(&mut self, reset: bool) -> Option<Retired> {
        self.in_reset = reset;
        if reset {
            self.cpu.reset();
            self.rom.reset_port();
            self.bus.reset();
            return None;
        }

        let retired = self.cpu.tick(&mut self.rom, &mut self.bus);
        self.rom.tick();
        self.bus.tick();
        self.cycle_count += 1;

        if let Some(retired) = &retired {
            let index = self.instr_count;
            self.instr_count += 1;
            self.push_trace(index, retired);
        }
        retired
    }

    /// Tick out of reset until the next instruction retires (at most four
    /// edges; the engine cannot stall).
    pub fn step_instruction(&mut self) -> Retired {
        loop {
            if let Some(retired) = self.tick(false) {
                return retired;
            }
        }
    }

    pub fn step_instructions(&mut self, count: u64) {
        for _ in 0..count {
            self.step_instruction();
        }
    }

    /// Current level of the four output pins, packed as `PIN_*` bits:
    /// output-register bits 0 and 1, the inverted reset level, and bit 2 of
    /// the current fetch address as a fetch-activity indicator.
    pub fn pins(&self) -> u8 {
        let mut pins = 0;
        if self.bus.out.bit(0) {
            pins |= PIN_OUT0;
        }
        if self.bus.out.bit(1) {
            pins |= PIN_OUT1;
        }
        if !self.in_reset {
            pins |= PIN_ACTIVE;
        }
        if self.cpu.fetch_addr() & 0b100 != 0 {
            pins |= PIN_FETCH;
        }
        pins
    }

    pub fn in_reset(&self) -> bool {
        self.in_reset
    }

    /// Edges ticked out of reset since power-up or the last restore.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Instructions retired since power-up or the last restore.
    pub fn instr_count(&self) -> u64 {
        self.instr_count
    }

    pub(crate) fn restore_counters(&mut self, cycle_count: u64, instr_count: u64) {
        self.cycle_count = cycle_count;
        self.instr_count = instr_count;
        // Snapshots are only taken of running machines.
        self.in_reset = false;
    }

    /// Keep the most recent `capacity` retire records.
    pub fn enable_trace(&mut self, capacity: usize) {
        self.trace = Some(VecDeque::with_capacity(capacity));
        self.trace_capacity = capacity;
    }

    pub fn trace(&self) -> impl Iterator<Item = &RetireRecord> {
        self.trace.iter().flatten()
    }

    /// Drain and return the buffered records. Tracing stays enabled.
    pub fn take_trace(&mut self) -> Vec<RetireRecord> {
        self.trace
            .as_mut()
            .map(|records| records.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        snapshot::save_snapshot(path, self)
    }

    pub fn load_snapshot(&mut self, path: &Path) -> Result<()> {
        snapshot::load_snapshot(path, self)
    }

    fn push_trace(&mut self, index: u64, retired: &Retired) {
        let capacity = self.trace_capacity;
        if let Some(records) = self.trace.as_mut() {
            if capacity == 0 {
                return;
            }
            if records.len() == capacity {
                records.pop_front();
            }
            records.push_back(RetireRecord {
                index,
                pc: retired.pc,
                word: retired.word,
                asm: disasm(retired.word),
                pc_after: retired.pc_after,
            });
        }
    }
}
