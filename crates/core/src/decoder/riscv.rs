// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt;

const OPCODE_LUI: u32 = 0x37;
const OPCODE_AUIPC: u32 = 0x17;
const OPCODE_JAL: u32 = 0x6F;
const OPCODE_JALR: u32 = 0x67;
const OPCODE_BRANCH: u32 = 0x63;
const OPCODE_LOAD: u32 = 0x03;
const OPCODE_STORE: u32 = 0x23;
const OPCODE_OP_IMM: u32 = 0x13;
const OPCODE_OP: u32 = 0x33;
const OPCODE_MISC_MEM: u32 = 0x0F;
const OPCODE_SYSTEM: u32 = 0x73;

const WORD_FENCE_TSO: u32 = 0x8330_000F;
const WORD_PAUSE: u32 = 0x0100_000F;
const WORD_ECALL: u32 = 0x0000_0073;
const WORD_EBREAK: u32 = 0x0010_0073;
const WORD_MRET: u32 = 0x3020_0073;
const WORD_WFI: u32 = 0x1050_0073;

/// RISC-V RV32I base integer instructions plus Zicsr and the machine-mode
/// system instructions the SoC firmware relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Fence,
    FenceTso,
    Pause,
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
    Unknown,
}

impl InstructionKind {
    pub fn mnemonic(self) -> &'static str {
        use InstructionKind::*;
        match self {
            Lui => "lui",
            Auipc => "auipc",
            Jal => "jal",
            Jalr => "jalr",
            Beq => "beq",
            Bne => "bne",
            Blt => "blt",
            Bge => "bge",
            Bltu => "bltu",
            Bgeu => "bgeu",
            Lb => "lb",
            Lh => "lh",
            Lw => "lw",
            Lbu => "lbu",
            Lhu => "lhu",
            Sb => "sb",
            Sh => "sh",
            Sw => "sw",
            Addi => "addi",
            Slti => "slti",
            Sltiu => "sltiu",
            Xori => "xori",
            Ori => "ori",
            Andi => "andi",
            Slli => "slli",
            Srli => "srli",
            Srai => "srai",
            Add => "add",
            Sub => "sub",
            Sll => "sll",
            Slt => "slt",
            Sltu => "sltu",
            Xor => "xor",
            Srl => "srl",
            Sra => "sra",
            Or => "or",
            And => "and",
            Fence => "fence",
            FenceTso => "fence.tso",
            Pause => "pause",
            Ecall => "ecall",
            Ebreak => "ebreak",
            Mret => "mret",
            Wfi => "wfi",
            Csrrw => "csrrw",
            Csrrs => "csrrs",
            Csrrc => "csrrc",
            Csrrwi => "csrrwi",
            Csrrsi => "csrrsi",
            Csrrci => "csrrci",
            Unknown => "unknown",
        }
    }
}

/// One decoded instruction word.
///
/// Fields a format does not define are zero: R-type has no immediate, S/B
/// have no `rd`, U/J have no source registers, and the fence/system tags
/// carry nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub kind: InstructionKind,
    pub imm: u32,
    pub rs1: u8,
    pub rs2: u8,
    pub rd: u8,
}

impl DecodedInstruction {
    fn tag(kind: InstructionKind) -> Self {
        Self {
            kind,
            imm: 0,
            rs1: 0,
            rs2: 0,
            rd: 0,
        }
    }

    pub fn unknown() -> Self {
        Self::tag(InstructionKind::Unknown)
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == InstructionKind::Unknown
    }

    /// Shift amount of SLLI/SRLI/SRAI.
    pub fn shamt(&self) -> u32 {
        self.imm & 0x1F
    }

    /// CSR address of a Zicsr instruction.
    pub fn csr(&self) -> u16 {
        (self.imm & 0xFFF) as u16
    }

    /// Zero-extended immediate of CSRRWI/CSRRSI/CSRRCI (held in the rs1 field).
    pub fn uimm(&self) -> u32 {
        self.rs1 as u32
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InstructionKind::*;
        let m = self.kind.mnemonic();
        let imm = self.imm as i32;
        match self.kind {
            Lui | Auipc => write!(f, "{} x{}, {:#x}", m, self.rd, self.imm >> 12),
            Jal => write!(f, "{} x{}, {}", m, self.rd, imm),
            Jalr | Lb | Lh | Lw | Lbu | Lhu => {
                write!(f, "{} x{}, {}(x{})", m, self.rd, imm, self.rs1)
            }
            Beq | Bne | Blt | Bge | Bltu | Bgeu => {
                write!(f, "{} x{}, x{}, {}", m, self.rs1, self.rs2, imm)
            }
            Sb | Sh | Sw => write!(f, "{} x{}, {}(x{})", m, self.rs2, imm, self.rs1),
            Addi | Slti | Sltiu | Xori | Ori | Andi => {
                write!(f, "{} x{}, x{}, {}", m, self.rd, self.rs1, imm)
            }
            Slli | Srli | Srai => {
                write!(f, "{} x{}, x{}, {}", m, self.rd, self.rs1, self.shamt())
            }
            Add | Sub | Sll | Slt | Sltu | Xor | Srl | Sra | Or | And => {
                write!(f, "{} x{}, x{}, x{}", m, self.rd, self.rs1, self.rs2)
            }
            Csrrw | Csrrs | Csrrc => {
                write!(f, "{} x{}, {:#05x}, x{}", m, self.rd, self.csr(), self.rs1)
            }
            Csrrwi | Csrrsi | Csrrci => {
                write!(f, "{} x{}, {:#05x}, {}", m, self.rd, self.csr(), self.uimm())
            }
            Fence | FenceTso | Pause | Ecall | Ebreak | Mret | Wfi | Unknown => f.write_str(m),
        }
    }
}

// imm[11:0] = inst[31:20]
fn imm_i(inst: u32) -> u32 {
    ((inst as i32) >> 20) as u32
}

// imm[11:5] = inst[31:25], imm[4:0] = inst[11:7]
fn imm_s(inst: u32) -> u32 {
    let imm = ((inst >> 25) << 5) | ((inst >> 7) & 0x1F);
    (((imm << 20) as i32) >> 20) as u32
}

// imm[12|10:5|4:1|11]
fn imm_b(inst: u32) -> u32 {
    let imm = (((inst >> 31) & 1) << 12)
        | (((inst >> 7) & 1) << 11)
        | (((inst >> 25) & 0x3F) << 5)
        | (((inst >> 8) & 0xF) << 1);
    (((imm << 19) as i32) >> 19) as u32
}

fn imm_u(inst: u32) -> u32 {
    inst & 0xFFFF_F000
}

// imm[20|10:1|11|19:12]
fn imm_j(inst: u32) -> u32 {
    let imm = (((inst >> 31) & 1) << 20)
        | (((inst >> 12) & 0xFF) << 12)
        | (((inst >> 20) & 1) << 11)
        | (((inst >> 21) & 0x3FF) << 1);
    (((imm << 11) as i32) >> 11) as u32
}

/// Decodes one instruction word. Never fails: anything that is not a
/// recognised encoding comes back as [`InstructionKind::Unknown`].
pub fn decode_rv32(inst: u32) -> DecodedInstruction {
    use InstructionKind::*;

    let opcode = inst & 0x7F;
    let rd = ((inst >> 7) & 0x1F) as u8;
    let funct3 = (inst >> 12) & 0x7;
    let rs1 = ((inst >> 15) & 0x1F) as u8;
    let rs2 = ((inst >> 20) & 0x1F) as u8;
    let funct7 = (inst >> 25) & 0x7F;
    // The one funct7 bit that separates ADD/SUB, SRL/SRA and SRLI/SRAI.
    let alt = (inst >> 30) & 1 == 1;

    let i_type = |kind| DecodedInstruction {
        kind,
        imm: imm_i(inst),
        rs1,
        rs2: 0,
        rd,
    };
    let s_type = |kind| DecodedInstruction {
        kind,
        imm: imm_s(inst),
        rs1,
        rs2,
        rd: 0,
    };
    let b_type = |kind| DecodedInstruction {
        kind,
        imm: imm_b(inst),
        rs1,
        rs2,
        rd: 0,
    };
    let r_type = |kind| DecodedInstruction {
        kind,
        imm: 0,
        rs1,
        rs2,
        rd,
    };

    match opcode {
        OPCODE_LUI => DecodedInstruction {
            kind: Lui,
            imm: imm_u(inst),
            rs1: 0,
            rs2: 0,
            rd,
        },
        OPCODE_AUIPC => DecodedInstruction {
            kind: Auipc,
            imm: imm_u(inst),
            rs1: 0,
            rs2: 0,
            rd,
        },
        OPCODE_JAL => DecodedInstruction {
            kind: Jal,
            imm: imm_j(inst),
            rs1: 0,
            rs2: 0,
            rd,
        },
        OPCODE_JALR if funct3 == 0 => i_type(Jalr),
        OPCODE_BRANCH => match funct3 {
            0 => b_type(Beq),
            1 => b_type(Bne),
            4 => b_type(Blt),
            5 => b_type(Bge),
            6 => b_type(Bltu),
            7 => b_type(Bgeu),
            _ => DecodedInstruction::unknown(),
        },
        OPCODE_LOAD => match funct3 {
            0 => i_type(Lb),
            1 => i_type(Lh),
            2 => i_type(Lw),
            4 => i_type(Lbu),
            5 => i_type(Lhu),
            _ => DecodedInstruction::unknown(),
        },
        OPCODE_STORE => match funct3 {
            0 => s_type(Sb),
            1 => s_type(Sh),
            2 => s_type(Sw),
            _ => DecodedInstruction::unknown(),
        },
        OPCODE_OP_IMM => match (funct3, funct7) {
            (0, _) => i_type(Addi),
            (2, _) => i_type(Slti),
            // Immediate is sign-extended even for the unsigned compare
            (3, _) => i_type(Sltiu),
            (4, _) => i_type(Xori),
            (6, _) => i_type(Ori),
            (7, _) => i_type(Andi),
            (1, 0x00) => i_type(Slli),
            (5, 0x00) => i_type(Srli),
            (5, 0x20) => i_type(Srai),
            _ => DecodedInstruction::unknown(),
        },
        OPCODE_OP => match (funct3, alt) {
            (0, false) => r_type(Add),
            (0, true) => r_type(Sub),
            (5, false) => r_type(Srl),
            (5, true) => r_type(Sra),
            (1, _) => r_type(Sll),
            (2, _) => r_type(Slt),
            (3, _) => r_type(Sltu),
            (4, _) => r_type(Xor),
            (6, _) => r_type(Or),
            (7, _) => r_type(And),
            _ => DecodedInstruction::unknown(),
        },
        OPCODE_MISC_MEM if funct3 == 0 => match inst {
            WORD_FENCE_TSO => DecodedInstruction::tag(FenceTso),
            WORD_PAUSE => DecodedInstruction::tag(Pause),
            _ => DecodedInstruction::tag(Fence),
        },
        OPCODE_SYSTEM => match funct3 {
            0 => match inst {
                WORD_ECALL => DecodedInstruction::tag(Ecall),
                WORD_EBREAK => DecodedInstruction::tag(Ebreak),
                WORD_MRET => DecodedInstruction::tag(Mret),
                WORD_WFI => DecodedInstruction::tag(Wfi),
                _ => DecodedInstruction::unknown(),
            },
            1 => i_type(Csrrw),
            2 => i_type(Csrrs),
            3 => i_type(Csrrc),
            5 => i_type(Csrrwi),
            6 => i_type(Csrrsi),
            7 => i_type(Csrrci),
            _ => DecodedInstruction::unknown(),
        },
        _ => DecodedInstruction::unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn i_word(opcode: u32, funct3: u32, rd: u32, rs1: u32, imm: u32) -> u32 {
        ((imm & 0xFFF) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
    }

    fn r_word(funct7: u32, funct3: u32, rd: u32, rs1: u32, rs2: u32) -> u32 {
        (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | OPCODE_OP
    }

    fn s_word(funct3: u32, rs1: u32, rs2: u32, imm: u32) -> u32 {
        (((imm >> 5) & 0x7F) << 25)
            | (rs2 << 20)
            | (rs1 << 15)
            | (funct3 << 12)
            | ((imm & 0x1F) << 7)
            | OPCODE_STORE
    }

    fn b_word(funct3: u32, rs1: u32, rs2: u32, imm: u32) -> u32 {
        (((imm >> 12) & 1) << 31)
            | (((imm >> 5) & 0x3F) << 25)
            | (rs2 << 20)
            | (rs1 << 15)
            | (funct3 << 12)
            | (((imm >> 1) & 0xF) << 8)
            | (((imm >> 11) & 1) << 7)
            | OPCODE_BRANCH
    }

    fn j_word(rd: u32, imm: u32) -> u32 {
        (((imm >> 20) & 1) << 31)
            | (((imm >> 1) & 0x3FF) << 21)
            | (((imm >> 11) & 1) << 20)
            | (((imm >> 12) & 0xFF) << 12)
            | (rd << 7)
            | OPCODE_JAL
    }

    #[test]
    fn test_addi_all_ones_immediate() {
        let inst = decode_rv32(i_word(OPCODE_OP_IMM, 0, 31, 31, 0xFFF));
        assert_eq!(
            inst,
            DecodedInstruction {
                kind: InstructionKind::Addi,
                imm: 0xFFFF_FFFF,
                rs1: 31,
                rs2: 0,
                rd: 31,
            }
        );
    }

    #[test]
    fn test_addi_zero() {
        // 0x00000013 is the canonical NOP
        let inst = decode_rv32(0x0000_0013);
        assert_eq!(inst.kind, InstructionKind::Addi);
        assert_eq!((inst.imm, inst.rs1, inst.rd), (0, 0, 0));
    }

    #[test]
    fn test_addi_small_fields() {
        for (imm, rs1, rd) in [(1, 0, 0), (0, 1, 0), (0, 0, 1), (1, 2, 3)] {
            let inst = decode_rv32(i_word(OPCODE_OP_IMM, 0, rd, rs1, imm));
            assert_eq!(inst.kind, InstructionKind::Addi);
            assert_eq!(inst.imm, imm);
            assert_eq!(inst.rs1 as u32, rs1);
            assert_eq!(inst.rd as u32, rd);
        }
    }

    #[test]
    fn test_r_type_discriminating_bit() {
        assert_eq!(decode_rv32(r_word(0x00, 0, 1, 2, 3)).kind, InstructionKind::Add);
        assert_eq!(decode_rv32(r_word(0x20, 0, 1, 2, 3)).kind, InstructionKind::Sub);
        assert_eq!(decode_rv32(r_word(0x00, 5, 1, 2, 3)).kind, InstructionKind::Srl);
        assert_eq!(decode_rv32(r_word(0x20, 5, 1, 2, 3)).kind, InstructionKind::Sra);

        let sub = decode_rv32(r_word(0x20, 0, 5, 6, 7));
        assert_eq!((sub.rd, sub.rs1, sub.rs2, sub.imm), (5, 6, 7, 0));
    }

    #[test]
    fn test_r_type_other_ops_by_funct3() {
        let expected = [
            (1, InstructionKind::Sll),
            (2, InstructionKind::Slt),
            (3, InstructionKind::Sltu),
            (4, InstructionKind::Xor),
            (6, InstructionKind::Or),
            (7, InstructionKind::And),
        ];
        for (funct3, kind) in expected {
            assert_eq!(decode_rv32(r_word(0x00, funct3, 1, 2, 3)).kind, kind);
        }
    }

    #[test]
    fn test_shift_immediates() {
        let slli = decode_rv32(i_word(OPCODE_OP_IMM, 1, 1, 2, 7));
        assert_eq!(slli.kind, InstructionKind::Slli);
        assert_eq!(slli.shamt(), 7);

        let srai = decode_rv32(i_word(OPCODE_OP_IMM, 5, 1, 2, 0x400 | 31));
        assert_eq!(srai.kind, InstructionKind::Srai);
        assert_eq!(srai.shamt(), 31);

        // Reserved funct7 for SLLI
        let bad = decode_rv32(i_word(OPCODE_OP_IMM, 1, 1, 2, 0x200 | 3));
        assert!(bad.is_unknown());
    }

    #[test]
    fn test_load_and_store_share_sign_extension() {
        for imm in [0u32, 1, 0x7FF, 0x800, 0xFFF, 0x123] {
            let lw = decode_rv32(i_word(OPCODE_LOAD, 2, 5, 6, imm));
            let sw = decode_rv32(s_word(2, 6, 5, imm));
            assert_eq!(lw.kind, InstructionKind::Lw);
            assert_eq!(sw.kind, InstructionKind::Sw);
            assert_eq!(lw.imm, sw.imm, "imm pattern {:#x}", imm);
            assert_eq!(sw.rs1, 6);
            assert_eq!(sw.rs2, 5);
            assert_eq!(sw.rd, 0);
        }
        assert_eq!(decode_rv32(s_word(0, 1, 2, 0xFFF)).imm, 0xFFFF_FFFF);
    }

    #[test]
    fn test_branch_immediate() {
        // BEQ x1, x2, +8
        let beq = decode_rv32(0x0020_8463);
        assert_eq!(beq.kind, InstructionKind::Beq);
        assert_eq!((beq.rs1, beq.rs2, beq.imm), (1, 2, 8));

        let back = decode_rv32(b_word(1, 3, 4, (-4096i32) as u32));
        assert_eq!(back.kind, InstructionKind::Bne);
        assert_eq!(back.imm as i32, -4096);

        let fwd = decode_rv32(b_word(7, 3, 4, 4094));
        assert_eq!(fwd.kind, InstructionKind::Bgeu);
        assert_eq!(fwd.imm, 4094);

        assert!(decode_rv32(b_word(2, 1, 1, 8)).is_unknown());
    }

    #[test]
    fn test_jal_immediate() {
        // JAL x0, 0 (tight loop)
        let j = decode_rv32(0x0000_006F);
        assert_eq!(j.kind, InstructionKind::Jal);
        assert_eq!((j.rd, j.imm), (0, 0));

        let far = decode_rv32(j_word(1, (-1_048_576i32) as u32));
        assert_eq!(far.rd, 1);
        assert_eq!(far.imm as i32, -1_048_576);

        let odd_bits = decode_rv32(j_word(1, 0x000F_F802));
        assert_eq!(odd_bits.imm, 0x000F_F802);
    }

    #[test]
    fn test_jalr_uses_i_format() {
        let jalr = decode_rv32(i_word(OPCODE_JALR, 0, 1, 5, 0xFFC));
        assert_eq!(jalr.kind, InstructionKind::Jalr);
        assert_eq!(jalr.imm as i32, -4);
        assert!(decode_rv32(i_word(OPCODE_JALR, 1, 1, 5, 0)).is_unknown());
    }

    #[test]
    fn test_upper_immediates() {
        let lui = decode_rv32(0x1234_50B7);
        assert_eq!(lui.kind, InstructionKind::Lui);
        assert_eq!((lui.rd, lui.imm), (1, 0x1234_5000));

        let auipc = decode_rv32(0xFFFF_F117);
        assert_eq!(auipc.kind, InstructionKind::Auipc);
        assert_eq!((auipc.rd, auipc.imm), (2, 0xFFFF_F000));
    }

    #[test]
    fn test_fence_family_and_system() {
        assert_eq!(decode_rv32(0x0FF0_000F).kind, InstructionKind::Fence);
        assert_eq!(decode_rv32(WORD_FENCE_TSO).kind, InstructionKind::FenceTso);
        assert_eq!(decode_rv32(WORD_PAUSE).kind, InstructionKind::Pause);
        assert_eq!(decode_rv32(WORD_ECALL).kind, InstructionKind::Ecall);
        assert_eq!(decode_rv32(WORD_EBREAK).kind, InstructionKind::Ebreak);
        assert_eq!(decode_rv32(WORD_MRET).kind, InstructionKind::Mret);
        assert_eq!(decode_rv32(WORD_WFI).kind, InstructionKind::Wfi);

        let fence = decode_rv32(0x0FF0_000F);
        assert_eq!((fence.rd, fence.rs1, fence.rs2, fence.imm), (0, 0, 0, 0));

        // FENCE.I belongs to Zifencei, not the base set
        assert!(decode_rv32(0x0000_100F).is_unknown());
    }

    #[test]
    fn test_csr_fields() {
        // csrrw x5, mscratch, x6
        let w = decode_rv32(i_word(OPCODE_SYSTEM, 1, 5, 6, 0x340));
        assert_eq!(w.kind, InstructionKind::Csrrw);
        assert_eq!((w.rd, w.rs1, w.csr()), (5, 6, 0x340));

        // csrrsi x0, mstatus, 8
        let si = decode_rv32(i_word(OPCODE_SYSTEM, 6, 0, 8, 0x300));
        assert_eq!(si.kind, InstructionKind::Csrrsi);
        assert_eq!((si.uimm(), si.csr()), (8, 0x300));

        // High CSR addresses keep all 12 bits
        let hartid = decode_rv32(i_word(OPCODE_SYSTEM, 2, 1, 0, 0xF14));
        assert_eq!(hartid.csr(), 0xF14);
    }

    #[test]
    fn test_edge_words_are_unknown() {
        assert_eq!(decode_rv32(0x0000_0000), DecodedInstruction::unknown());
        assert_eq!(decode_rv32(0xFFFF_FFFF), DecodedInstruction::unknown());
    }

    #[test]
    fn test_display() {
        assert_eq!(decode_rv32(0x0050_0093).to_string(), "addi x1, x0, 5");
        assert_eq!(decode_rv32(0x0020_8463).to_string(), "beq x1, x2, 8");
        assert_eq!(decode_rv32(WORD_ECALL).to_string(), "ecall");
    }

    proptest! {
        #[test]
        fn prop_decode_is_total(word in any::<u32>()) {
            let inst = decode_rv32(word);
            prop_assert!(inst.rd < 32 && inst.rs1 < 32 && inst.rs2 < 32);
        }

        #[test]
        fn prop_i_immediate_sign_extends(imm in 0u32..0x1000, rd in 0u32..32, rs1 in 0u32..32) {
            let inst = decode_rv32(i_word(OPCODE_OP_IMM, 0, rd, rs1, imm));
            let expected = ((imm as i32) << 20 >> 20) as u32;
            prop_assert_eq!(inst.imm, expected);
        }

        #[test]
        fn prop_branch_offsets_are_even(word in any::<u32>()) {
            let inst = decode_rv32((word & !0x7F) | OPCODE_BRANCH);
            prop_assert_eq!(inst.imm & 1, 0);
        }
    }
}
