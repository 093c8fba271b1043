use serde::{Deserialize, Serialize};

use crate::bus::DataBus;
use crate::decode::{decode, DecodedInstr, Op};
use crate::rom::InstructionRom;

/// PC value driven while reset is held and at the first fetch after release.
pub const RESET_PC: u32 = 0x0000_0000;

/// Engine states. Every instruction passes FETCH, DECODE and EXECUTE;
/// only stores take the extra MEMORY state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    Fetch,
    Decode,
    Execute,
    Memory,
}

/// Store parameters registered at the EXECUTE edge and presented to the
/// bus during MEMORY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedWrite {
    pub addr: u32,
    pub data: u32,
    pub mask: u8,
}

/// Reported once per completed instruction, at the edge that commits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retired {
    pub pc: u32,
    pub word: u32,
    pub pc_after: u32,
}

/// The five-instruction execution engine.
///
/// One [`tick`](Self::tick) is one clock edge: the engine reads the store
/// ports as latched at the previous edge, presents this cycle's requests,
/// and commits its own next state on return. Register 0 reads as zero;
/// writes to it are accepted and dropped.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    state: ExecState,
    pc: u32,
    regs: [u32; 32],
    instr: DecodedInstr,
    staged: Option<StagedWrite>,
    fetch_addr: u32,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self {
            state: ExecState::Fetch,
            pc: RESET_PC,
            regs: [0; 32],
            instr: decode(0),
            staged: None,
            fetch_addr: RESET_PC,
        }
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn reg(&self, index: usize) -> u32 {
        self.regs[index]
    }

    pub fn regs(&self) -> &[u32; 32] {
        &self.regs
    }

    /// Harness hook for preloading register state. Register 0 stays zero.
    pub fn set_reg(&mut self, index: usize, value: u32) {
        if index != 0 {
            self.regs[index] = value;
        }
    }

    /// Word currently latched as the active instruction. Meaningful in
    /// EXECUTE and MEMORY.
    pub fn instr_word(&self) -> u32 {
        self.instr.word
    }

    pub fn staged(&self) -> Option<StagedWrite> {
        self.staged
    }

    /// Byte address most recently presented to the instruction store.
    pub fn fetch_addr(&self) -> u32 {
        self.fetch_addr
    }

    /// Synchronous reset: hold FETCH at the reset vector, clear the register
    /// file and any staged store.
    pub fn reset(&mut self) {
        self.state = ExecState::Fetch;
        self.pc = RESET_PC;
        self.regs = [0; 32];
        self.instr = decode(0);
        self.staged = None;
        self.fetch_addr = RESET_PC;
    }

    pub(crate) fn restore(
        state: ExecState,
        pc: u32,
        regs: [u32; 32],
        instr_word: u32,
        staged: Option<StagedWrite>,
        fetch_addr: u32,
    ) -> Self {
        let mut engine = Self {
            state,
            pc,
            regs,
            instr: decode(instr_word),
            staged,
            fetch_addr,
        };
        engine.regs[0] = 0;
        engine
    }

    /// Advance one clock edge. Returns the retire event when this edge
    /// completes an instruction.
    pub fn tick(&mut self, rom: &mut InstructionRom, bus: &mut DataBus) -> Option<Retired> {
        match self.state {
            ExecState::Fetch => {
                self.fetch_addr = self.pc;
                rom.issue_read((self.pc >> 2) as usize);
                self.state = ExecState::Decode;
                None
            }
            ExecState::Decode => {
                // The word requested in FETCH was latched at the last edge.
                self.instr = decode(rom.fetched());
                self.state = ExecState::Execute;
                None
            }
            ExecState::Execute => self.execute(),
            ExecState::Memory => {
                if let Some(StagedWrite { addr, data, mask }) = self.staged.take() {
                    bus.issue_write(addr, data, mask);
                }
                let pc = self.pc;
                self.pc = pc.wrapping_add(4);
                self.state = ExecState::Fetch;
                Some(Retired {
                    pc,
                    word: self.instr.word,
                    pc_after: self.pc,
                })
            }
        }
    }

    fn execute(&mut self) -> Option<Retired> {
        let i = self.instr;
        let pc = self.pc;
        let mut next_pc = pc.wrapping_add(4);
        match i.op {
            Some(Op::Lui) => self.write_reg(i.rd, i.imm_u),
            Some(Op::Addi) => {
                let value = self.reg(i.rs1).wrapping_add(i.imm_i as u32);
                self.write_reg(i.rd, value);
            }
            Some(Op::Sw) => {
                let addr = self.reg(i.rs1).wrapping_add(i.imm_s as u32);
                self.staged = Some(StagedWrite {
                    addr,
                    data: self.reg(i.rs2),
                    mask: 0b1111,
                });
                self.state = ExecState::Memory;
                return None;
            }
            Some(Op::Bne) => {
                if self.reg(i.rs1) != self.reg(i.rs2) {
                    next_pc = pc.wrapping_add(i.imm_b as u32);
                }
            }
            Some(Op::Jal) => {
                self.write_reg(i.rd, pc.wrapping_add(4));
                next_pc = pc.wrapping_add(i.imm_j as u32);
            }
            // Words outside the subset retire as no-ops.
            None => {}
        }
        self.pc = next_pc;
        self.state = ExecState::Fetch;
        Some(Retired {
            pc,
            word: i.word,
            pc_after: next_pc,
        })
    }

    fn write_reg(&mut self, index: usize, value: u32) {
        if index != 0 {
            self.regs[index] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RAM_BASE;
    use crate::program;

    fn machine(image: &[u32]) -> (ExecutionEngine, InstructionRom, DataBus) {
        let rom = InstructionRom::new(image).expect("test image fits");
        (ExecutionEngine::new(), rom, DataBus::new())
    }

    fn clock(
        cpu: &mut ExecutionEngine,
        rom: &mut InstructionRom,
        bus: &mut DataBus,
    ) -> Option<Retired> {
        let retired = cpu.tick(rom, bus);
        rom.tick();
        bus.tick();
        retired
    }

    #[test]
    fn alu_instruction_takes_three_ticks() {
        let (mut cpu, mut rom, mut bus) = machine(&[program::addi(1, 0, 5)]);
        assert!(clock(&mut cpu, &mut rom, &mut bus).is_none(), "fetch");
        assert!(clock(&mut cpu, &mut rom, &mut bus).is_none(), "decode");
        let retired = clock(&mut cpu, &mut rom, &mut bus).expect("execute retires");
        assert_eq!(retired.pc, 0);
        assert_eq!(retired.pc_after, 4);
        assert_eq!(cpu.reg(1), 5);
    }

    #[test]
    fn store_takes_four_ticks_and_lands_after_memory() {
        let (mut cpu, mut rom, mut bus) = machine(&[program::sw(6, 5, 0)]);
        cpu.set_reg(5, RAM_BASE);
        cpu.set_reg(6, 0xABCD);

        assert!(clock(&mut cpu, &mut rom, &mut bus).is_none(), "fetch");
        assert!(clock(&mut cpu, &mut rom, &mut bus).is_none(), "decode");
        assert!(clock(&mut cpu, &mut rom, &mut bus).is_none(), "execute stages only");
        assert_eq!(cpu.state(), ExecState::Memory);
        assert_eq!(bus.ram.word(0), 0, "store must not land before the memory edge");

        let retired = clock(&mut cpu, &mut rom, &mut bus).expect("memory retires");
        assert_eq!(retired.pc_after, 4);
        assert_eq!(bus.ram.word(0), 0xABCD);
    }

    #[test]
    fn register_zero_stays_zero() {
        let (mut cpu, mut rom, mut bus) = machine(&[program::addi(0, 0, 7), program::jal(0, 8)]);
        for _ in 0..3 {
            clock(&mut cpu, &mut rom, &mut bus);
        }
        assert_eq!(cpu.reg(0), 0, "addi to x0 is dropped");
        for _ in 0..3 {
            clock(&mut cpu, &mut rom, &mut bus);
        }
        assert_eq!(cpu.reg(0), 0, "jal link to x0 is dropped");
        assert_eq!(cpu.pc(), 12, "jump still redirects the pc");
    }

    #[test]
    fn branch_taken_and_fall_through() {
        let (mut cpu, mut rom, mut bus) = machine(&[program::bne(1, 2, 12)]);
        cpu.set_reg(1, 5);
        cpu.set_reg(2, 7);
        for _ in 0..2 {
            clock(&mut cpu, &mut rom, &mut bus);
        }
        let retired = clock(&mut cpu, &mut rom, &mut bus).expect("branch retires");
        assert_eq!(retired.pc_after, 12, "unequal operands take the branch");

        let (mut cpu, mut rom, mut bus) = machine(&[program::bne(1, 2, 12)]);
        cpu.set_reg(1, 5);
        cpu.set_reg(2, 5);
        for _ in 0..2 {
            clock(&mut cpu, &mut rom, &mut bus);
        }
        let retired = clock(&mut cpu, &mut rom, &mut bus).expect("branch retires");
        assert_eq!(retired.pc_after, 4, "equal operands fall through");
    }

    #[test]
    fn jal_links_then_jumps() {
        let (mut cpu, mut rom, mut bus) = machine(&[program::nop(), program::jal(1, -4)]);
        for _ in 0..3 {
            clock(&mut cpu, &mut rom, &mut bus);
        }
        for _ in 0..2 {
            clock(&mut cpu, &mut rom, &mut bus);
        }
        let retired = clock(&mut cpu, &mut rom, &mut bus).expect("jal retires");
        assert_eq!(cpu.reg(1), 8, "link register holds pc + 4");
        assert_eq!(retired.pc_after, 0, "backward jump from word 1");
    }

    #[test]
    fn words_outside_the_subset_retire_as_noops() {
        let (mut cpu, mut rom, mut bus) = machine(&[0xFFFF_FFFF]);
        for _ in 0..2 {
            clock(&mut cpu, &mut rom, &mut bus);
        }
        let retired = clock(&mut cpu, &mut rom, &mut bus).expect("noop retires");
        assert_eq!(retired.pc_after, 4);
        assert_eq!(cpu.regs(), &[0u32; 32], "no register side effects");
        assert_eq!(cpu.state(), ExecState::Fetch, "no memory state for non-stores");
    }
}
