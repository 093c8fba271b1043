//! Instruction-word field extraction for the five-instruction RV32 subset.

pub const OPC_LUI: u32 = 0b011_0111;
pub const OPC_OPIMM: u32 = 0b001_0011;
pub const OPC_STORE: u32 = 0b010_0011;
pub const OPC_BRANCH: u32 = 0b110_0011;
pub const OPC_JAL: u32 = 0b110_1111;

pub const FUNCT3_ADDI: u32 = 0b000;
pub const FUNCT3_SW: u32 = 0b010;
pub const FUNCT3_BNE: u32 = 0b001;

/// Operations the execution engine recognises. Words that match none of
/// these retire as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lui,
    Addi,
    Sw,
    Bne,
    Jal,
}

/// Every field of one instruction word, extracted unconditionally.
///
/// All five immediate variants are populated on every decode; which one is
/// meaningful depends on [`DecodedInstr::op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstr {
    pub word: u32,
    pub op: Option<Op>,
    pub rd: usize,
    pub rs1: usize,
    pub rs2: usize,
    pub funct3: u32,
    pub imm_i: i32,
    pub imm_s: i32,
    pub imm_b: i32,
    /// Upper immediate, already shifted into bits 31:12.
    pub imm_u: u32,
    pub imm_j: i32,
}

#[inline]
fn bits(v: u32, hi: u32, lo: u32) -> u32 {
    (v >> lo) & ((1u32 << (hi - lo + 1)) - 1)
}

#[inline]
fn sext(v: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((v << shift) as i32) >> shift
}

/// Decode one instruction word. Total: any of the 2^32 words produces a
/// `DecodedInstr`, with `op == None` for encodings outside the subset.
pub fn decode(word: u32) -> DecodedInstr {
    let opcode = bits(word, 6, 0);
    let funct3 = bits(word, 14, 12);

    let imm_s = sext((bits(word, 31, 25) << 5) | bits(word, 11, 7), 12);
    let imm_b = sext(
        (bits(word, 31, 31) << 12)
            | (bits(word, 7, 7) << 11)
            | (bits(word, 30, 25) << 5)
            | (bits(word, 11, 8) << 1),
        13,
    );
    let imm_j = sext(
        (bits(word, 31, 31) << 20)
            | (bits(word, 19, 12) << 12)
            | (bits(word, 20, 20) << 11)
            | (bits(word, 30, 21) << 1),
        21,
    );

    DecodedInstr {
        word,
        op: classify(opcode, funct3),
        rd: bits(word, 11, 7) as usize,
        rs1: bits(word, 19, 15) as usize,
        rs2: bits(word, 24, 20) as usize,
        funct3,
        imm_i: sext(bits(word, 31, 20), 12),
        imm_s,
        imm_b,
        imm_u: word & 0xFFFF_F000,
        imm_j,
    }
}

fn classify(opcode: u32, funct3: u32) -> Option<Op> {
    match (opcode, funct3) {
        (OPC_LUI, _) => Some(Op::Lui),
        (OPC_OPIMM, FUNCT3_ADDI) => Some(Op::Addi),
        (OPC_STORE, FUNCT3_SW) => Some(Op::Sw),
        (OPC_BRANCH, FUNCT3_BNE) => Some(Op::Bne),
        (OPC_JAL, _) => Some(Op::Jal),
        _ => None,
    }
}

/// ABI names for the registers the boot program touches; plain x-names
/// for the rest.
fn reg_name(index: usize) -> String {
    match index {
        2 => "sp".into(),
        5 => "t0".into(),
        6 => "t1".into(),
        10 => "a0".into(),
        _ => format!("x{index}"),
    }
}

/// Render one word for trace output. Unrecognised words fall back to a raw
/// `.word` directive.
pub fn disasm(word: u32) -> String {
    let i = decode(word);
    match i.op {
        Some(Op::Lui) => format!("lui {}, 0x{:x}", reg_name(i.rd), word >> 12),
        Some(Op::Addi) => format!("addi {}, {}, {}", reg_name(i.rd), reg_name(i.rs1), i.imm_i),
        Some(Op::Sw) => format!("sw {}, {}({})", reg_name(i.rs2), i.imm_s, reg_name(i.rs1)),
        Some(Op::Bne) => format!("bne {}, {}, {}", reg_name(i.rs1), reg_name(i.rs2), i.imm_b),
        Some(Op::Jal) => format!("jal {}, {}", reg_name(i.rd), i.imm_j),
        None => format!(".word 0x{word:08x}"),
    }
}
