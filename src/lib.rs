//! Cycle-accurate model of a small RV32 system-on-chip: a five-instruction
//! execution engine (lui/addi/sw/bne/jal), a 256-word instruction ROM, a
//! 1024-word data RAM and one memory-mapped output register.
//!
//! One [`Soc::tick`](soc::Soc::tick) is one clock edge. Every component
//! computes its next state from the pre-edge snapshot and commits on return,
//! so store writes requested on edge *n* are visible from edge *n+1*.

use thiserror::Error;

pub mod bus;
pub mod cpu;
pub mod decode;
pub mod program;
pub mod ram;
pub mod rom;
pub mod snapshot;
pub mod soc;

pub use bus::{
    decode_address, BusTarget, DataBus, OutputRegister, WriteRecord, OUT_REG_ADDR, RAM_BASE,
    RAM_END, ROM_BASE, ROM_END,
};
pub use cpu::{ExecState, ExecutionEngine, Retired, StagedWrite};
pub use decode::{decode, disasm, DecodedInstr, Op};
pub use program::{blinker_program, load_program_file, BOOT_PROGRAM, NOP_WORD};
pub use ram::{DataRam, RAM_BYTES, RAM_WORDS};
pub use rom::{InstructionRom, ROM_BYTES, ROM_WORDS};
pub use snapshot::{load_snapshot, save_snapshot, Snapshot, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use soc::{RetireRecord, Soc, PIN_ACTIVE, PIN_FETCH, PIN_OUT0, PIN_OUT1};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("program image too large: {words} words (rom holds {limit})")]
    ProgramTooLarge { words: usize, limit: usize },
    #[error("bad program image: {0}")]
    BadProgramImage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot error: {0}")]
    InvalidSnapshot(String),
}
