//! The built-in boot image, instruction encoders and program-image loaders.

use std::fs;
use std::path::Path;

use crate::rom::ROM_WORDS;
use crate::{CoreError, Result};

/// `addi x0, x0, 0`: the fill word for unused instruction-store slots.
pub const NOP_WORD: u32 = 0x0000_0013;

/// Delay-loop count baked into [`BOOT_PROGRAM`]. At one decrement per loop
/// iteration this paces the blink for a clock in the tens of MHz.
pub const BOOT_DELAY: u32 = 0x0773_4940;

const SP: usize = 2;
const T0: usize = 5;
const T1: usize = 6;
const A0: usize = 10;

/// The LED blink loop burned into the instruction store by default.
///
/// Word 0 sets up a stack pointer and runs once; the loop body (words 1-14)
/// drives output bit 0 high, spins the delay counter down, drives it low,
/// spins again and jumps back.
pub const BOOT_PROGRAM: [u32; 15] = [
    0x1000_1137, // lui  sp, 0x10001
    0x2000_02B7, // lui  t0, 0x20000
    0x0010_0313, // addi t1, x0, 1
    0x0062_A023, // sw   t1, 0(t0)
    0x0773_5537, // lui  a0, 0x7735
    0x9405_0513, // addi a0, a0, -1728
    0xFFF5_0513, // addi a0, a0, -1
    0xFE05_1EE3, // bne  a0, x0, -4
    0x0000_0313, // addi t1, x0, 0
    0x0062_A023, // sw   t1, 0(t0)
    0x0773_5537, // lui  a0, 0x7735
    0x9405_0513, // addi a0, a0, -1728
    0xFFF5_0513, // addi a0, a0, -1
    0xFE05_1EE3, // bne  a0, x0, -4
    0xFCDF_F06F, // jal  x0, -52
];

pub fn lui(rd: usize, imm20: u32) -> u32 {
    ((imm20 & 0xF_FFFF) << 12) | ((rd as u32 & 0x1F) << 7) | 0x37
}

pub fn addi(rd: usize, rs1: usize, imm: i32) -> u32 {
    ((imm as u32 & 0xFFF) << 20)
        | ((rs1 as u32 & 0x1F) << 15)
        | ((rd as u32 & 0x1F) << 7)
        | 0x13
}

/// `sw rs2, imm(rs1)`: the 12-bit offset splits across bits 31:25 and 11:7.
pub fn sw(rs2: usize, rs1: usize, imm: i32) -> u32 {
    let imm = imm as u32 & 0xFFF;
    ((imm >> 5) << 25)
        | ((rs2 as u32 & 0x1F) << 20)
        | ((rs1 as u32 & 0x1F) << 15)
        | (0b010 << 12)
        | ((imm & 0x1F) << 7)
        | 0x23
}

/// `bne rs1, rs2, offset`: byte offset relative to the branch, even,
/// 13 bits signed.
pub fn bne(rs1: usize, rs2: usize, offset: i32) -> u32 {
    let imm = offset as u32 & 0x1FFE;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | ((rs2 as u32 & 0x1F) << 20)
        | ((rs1 as u32 & 0x1F) << 15)
        | (0b001 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | 0x63
}

/// `jal rd, offset`: byte offset relative to the jump, even, 21 bits signed.
pub fn jal(rd: usize, offset: i32) -> u32 {
    let imm = offset as u32 & 0x1F_FFFE;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | ((rd as u32 & 0x1F) << 7)
        | 0x6F
}

pub fn nop() -> u32 {
    NOP_WORD
}

/// Build the blink loop with a caller-chosen delay count. Structurally
/// identical to [`BOOT_PROGRAM`], which is `blinker_program(BOOT_DELAY)`;
/// tests use small counts to keep runs short. `delay` must be at least 1.
pub fn blinker_program(delay: u32) -> Vec<u32> {
    let hi = delay.wrapping_add(0x800) >> 12;
    let lo = (delay as i64 - ((hi as i64) << 12)) as i32;
    vec![
        lui(SP, 0x10001),
        lui(T0, 0x20000),
        addi(T1, 0, 1),
        sw(T1, T0, 0),
        lui(A0, hi),
        addi(A0, A0, lo),
        addi(A0, A0, -1),
        bne(A0, 0, -4),
        addi(T1, 0, 0),
        sw(T1, T0, 0),
        lui(A0, hi),
        addi(A0, A0, lo),
        addi(A0, A0, -1),
        bne(A0, 0, -4),
        jal(0, -52),
    ]
}

/// Load a program image from disk. A `.bin` extension selects raw
/// little-endian words; anything else is parsed as whitespace-separated hex
/// words with `#` or `//` comments.
pub fn load_program_file(path: &Path) -> Result<Vec<u32>> {
    let raw = fs::read(path)?;
    let words = if path.extension().is_some_and(|ext| ext == "bin") {
        words_from_le_bytes(&raw)?
    } else {
        let text = String::from_utf8(raw)
            .map_err(|_| CoreError::BadProgramImage("program text is not utf-8".into()))?;
        parse_hex_words(&text)?
    };
    if words.len() > ROM_WORDS {
        return Err(CoreError::ProgramTooLarge {
            words: words.len(),
            limit: ROM_WORDS,
        });
    }
    Ok(words)
}

fn parse_hex_words(text: &str) -> Result<Vec<u32>> {
    let mut words = Vec::new();
    for line in text.lines() {
        let code = line.split_once('#').map_or(line, |(code, _)| code);
        let code = code.split_once("//").map_or(code, |(code, _)| code);
        for token in code.split_whitespace() {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let word = u32::from_str_radix(digits, 16).map_err(|_| {
                CoreError::BadProgramImage(format!("not a hex word: {token:?}"))
            })?;
            words.push(word);
        }
    }
    Ok(words)
}

fn words_from_le_bytes(raw: &[u8]) -> Result<Vec<u32>> {
    if raw.len() % 4 != 0 {
        return Err(CoreError::BadProgramImage(format!(
            "binary image length {} is not a whole number of words",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
