use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cpu::{ExecState, ExecutionEngine, StagedWrite};
use crate::ram::RAM_WORDS;
use crate::soc::Soc;
use crate::{CoreError, Result};

pub const SNAPSHOT_MAGIC: &str = "rv5soc-snapshot";
pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete machine state as persisted to disk, including the mid-instruction
/// latches, so a restore continues edge-exact. The instruction store itself
/// is identified by checksum only; restoring validates it against the rom of
/// the target machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub magic: String,
    pub version: u32,
    pub cycle_count: u64,
    pub instr_count: u64,
    pub state: ExecState,
    pub pc: u32,
    pub regs: Vec<u32>,
    pub instr_word: u32,
    pub staged: Option<StagedWrite>,
    pub fetch_addr: u32,
    pub fetched: u32,
    pub ram: Vec<u32>,
    pub out_reg: u32,
    pub rom_fnv: u32,
}

/// FNV-1a over the little-endian bytes of the stored words.
pub fn rom_checksum(words: &[u32]) -> u32 {
    let mut hash: u32 = 0x811C_9DC5;
    for word in words {
        for byte in word.to_le_bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
    }
    hash
}

pub fn save_snapshot(path: &Path, soc: &Soc) -> Result<()> {
    let snapshot = Snapshot {
        magic: SNAPSHOT_MAGIC.to_string(),
        version: SNAPSHOT_VERSION,
        cycle_count: soc.cycle_count(),
        instr_count: soc.instr_count(),
        state: soc.cpu.state(),
        pc: soc.cpu.pc(),
        regs: soc.cpu.regs().to_vec(),
        instr_word: soc.cpu.instr_word(),
        staged: soc.cpu.staged(),
        fetch_addr: soc.cpu.fetch_addr(),
        fetched: soc.rom.fetched(),
        ram: soc.bus.ram.words().to_vec(),
        out_reg: soc.bus.out.value(),
        rom_fnv: rom_checksum(soc.rom.words()),
    };
    let json = serde_json::to_vec_pretty(&snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_snapshot(path: &Path, soc: &mut Soc) -> Result<()> {
    let raw = fs::read(path)?;
    let snapshot: Snapshot = serde_json::from_slice(&raw)?;
    apply_snapshot(&snapshot, soc)
}

/// Validate `snapshot` and install it into `soc`.
pub fn apply_snapshot(snapshot: &Snapshot, soc: &mut Soc) -> Result<()> {
    if snapshot.magic != SNAPSHOT_MAGIC {
        return Err(CoreError::InvalidSnapshot(format!(
            "bad magic {:?}",
            snapshot.magic
        )));
    }
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CoreError::InvalidSnapshot(format!(
            "unsupported version {}",
            snapshot.version
        )));
    }
    if snapshot.regs.len() != 32 {
        return Err(CoreError::InvalidSnapshot(format!(
            "expected 32 registers, found {}",
            snapshot.regs.len()
        )));
    }
    if snapshot.ram.len() != RAM_WORDS {
        return Err(CoreError::InvalidSnapshot(format!(
            "expected {RAM_WORDS} ram words, found {}",
            snapshot.ram.len()
        )));
    }
    if snapshot.rom_fnv != rom_checksum(soc.rom.words()) {
        return Err(CoreError::InvalidSnapshot(
            "snapshot was taken from a different program image".to_string(),
        ));
    }

    let mut regs = [0u32; 32];
    regs.copy_from_slice(&snapshot.regs);
    soc.cpu = ExecutionEngine::restore(
        snapshot.state,
        snapshot.pc,
        regs,
        snapshot.instr_word,
        snapshot.staged,
        snapshot.fetch_addr,
    );
    soc.bus.reset();
    soc.bus.ram.load_words(&snapshot.ram);
    soc.bus.out.set_value(snapshot.out_reg);
    soc.rom.reset_port();
    soc.rom.set_fetched(snapshot.fetched);
    soc.restore_counters(snapshot.cycle_count, snapshot.instr_count);
    Ok(())
}
