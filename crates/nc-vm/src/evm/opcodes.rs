//! # Opcodes
//!
//! The Byzantium/Constantinople-era instruction set, with account operands
//! carried as name words. CREATE2 and SELFDESTRUCT are not part of the set;
//! like every unassigned byte they decode to `None` and fail as invalid
//! opcodes.
//!
//! Three extensions sit in otherwise unused ranges:
//!
//! | Byte | Opcode | Stack |
//! |------|--------|-------|
//! | 0x46 | `CALLASSETID` | pushes the frame's asset id |
//! | 0xC0 | `BALANCEEX` | `name, asset_id -> balance` |
//! | 0xF6 | `PLUGINCALL` | `action_type, to, asset_id, value, in_offset, in_size -> success` |

/// Instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // 0x00 - Stop and Arithmetic
    Stop = 0x00,
    Add = 0x01,
    Mul = 0x02,
    Sub = 0x03,
    Div = 0x04,
    SDiv = 0x05,
    Mod = 0x06,
    SMod = 0x07,
    AddMod = 0x08,
    MulMod = 0x09,
    Exp = 0x0A,
    SignExtend = 0x0B,

    // 0x10 - Comparison & Bitwise
    Lt = 0x10,
    Gt = 0x11,
    SLt = 0x12,
    SGt = 0x13,
    Eq = 0x14,
    IsZero = 0x15,
    And = 0x16,
    Or = 0x17,
    Xor = 0x18,
    Not = 0x19,
    Byte = 0x1A,
    Shl = 0x1B,
    Shr = 0x1C,
    Sar = 0x1D,

    // 0x20 - Keccak256
    Sha3 = 0x20,

    // 0x30 - Environment (account operands are name words)
    Address = 0x30,
    Balance = 0x31,
    Origin = 0x32,
    Caller = 0x33,
    CallValue = 0x34,
    CallDataLoad = 0x35,
    CallDataSize = 0x36,
    CallDataCopy = 0x37,
    CodeSize = 0x38,
    CodeCopy = 0x39,
    GasPrice = 0x3A,
    ExtCodeSize = 0x3B,
    ExtCodeCopy = 0x3C,
    ReturnDataSize = 0x3D,
    ReturnDataCopy = 0x3E,
    ExtCodeHash = 0x3F,

    // 0x40 - Block Information
    BlockHash = 0x40,
    Coinbase = 0x41,
    Timestamp = 0x42,
    Number = 0x43,
    Difficulty = 0x44,
    GasLimit = 0x45,
    CallAssetId = 0x46,

    // 0x50 - Stack, Memory, Storage and Flow
    Pop = 0x50,
    MLoad = 0x51,
    MStore = 0x52,
    MStore8 = 0x53,
    SLoad = 0x54,
    SStore = 0x55,
    Jump = 0x56,
    JumpI = 0x57,
    Pc = 0x58,
    MSize = 0x59,
    Gas = 0x5A,
    JumpDest = 0x5B,

    // 0x60 - Push
    Push1 = 0x60,
    Push2 = 0x61,
    Push3 = 0x62,
    Push4 = 0x63,
    Push5 = 0x64,
    Push6 = 0x65,
    Push7 = 0x66,
    Push8 = 0x67,
    Push9 = 0x68,
    Push10 = 0x69,
    Push11 = 0x6A,
    Push12 = 0x6B,
    Push13 = 0x6C,
    Push14 = 0x6D,
    Push15 = 0x6E,
    Push16 = 0x6F,
    Push17 = 0x70,
    Push18 = 0x71,
    Push19 = 0x72,
    Push20 = 0x73,
    Push21 = 0x74,
    Push22 = 0x75,
    Push23 = 0x76,
    Push24 = 0x77,
    Push25 = 0x78,
    Push26 = 0x79,
    Push27 = 0x7A,
    Push28 = 0x7B,
    Push29 = 0x7C,
    Push30 = 0x7D,
    Push31 = 0x7E,
    Push32 = 0x7F,

    // 0x80 - Duplication
    Dup1 = 0x80,
    Dup2 = 0x81,
    Dup3 = 0x82,
    Dup4 = 0x83,
    Dup5 = 0x84,
    Dup6 = 0x85,
    Dup7 = 0x86,
    Dup8 = 0x87,
    Dup9 = 0x88,
    Dup10 = 0x89,
    Dup11 = 0x8A,
    Dup12 = 0x8B,
    Dup13 = 0x8C,
    Dup14 = 0x8D,
    Dup15 = 0x8E,
    Dup16 = 0x8F,

    // 0x90 - Exchange
    Swap1 = 0x90,
    Swap2 = 0x91,
    Swap3 = 0x92,
    Swap4 = 0x93,
    Swap5 = 0x94,
    Swap6 = 0x95,
    Swap7 = 0x96,
    Swap8 = 0x97,
    Swap9 = 0x98,
    Swap10 = 0x99,
    Swap11 = 0x9A,
    Swap12 = 0x9B,
    Swap13 = 0x9C,
    Swap14 = 0x9D,
    Swap15 = 0x9E,
    Swap16 = 0x9F,

    // 0xA0 - Logging
    Log0 = 0xA0,
    Log1 = 0xA1,
    Log2 = 0xA2,
    Log3 = 0xA3,
    Log4 = 0xA4,

    // 0xC0 - Asset extensions
    BalanceEx = 0xC0,

    // 0xF0 - System
    Create = 0xF0,
    Call = 0xF1,
    CallCode = 0xF2,
    Return = 0xF3,
    DelegateCall = 0xF4,
    PluginCall = 0xF6,
    StaticCall = 0xFA,
    Revert = 0xFD,
    Invalid = 0xFE,
}

impl Opcode {
    /// Decode a byte. Unassigned bytes return `None`.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Stop,
            0x01 => Self::Add,
            0x02 => Self::Mul,
            0x03 => Self::Sub,
            0x04 => Self::Div,
            0x05 => Self::SDiv,
            0x06 => Self::Mod,
            0x07 => Self::SMod,
            0x08 => Self::AddMod,
            0x09 => Self::MulMod,
            0x0A => Self::Exp,
            0x0B => Self::SignExtend,
            0x10 => Self::Lt,
            0x11 => Self::Gt,
            0x12 => Self::SLt,
            0x13 => Self::SGt,
            0x14 => Self::Eq,
            0x15 => Self::IsZero,
            0x16 => Self::And,
            0x17 => Self::Or,
            0x18 => Self::Xor,
            0x19 => Self::Not,
            0x1A => Self::Byte,
            0x1B => Self::Shl,
            0x1C => Self::Shr,
            0x1D => Self::Sar,
            0x20 => Self::Sha3,
            0x30 => Self::Address,
            0x31 => Self::Balance,
            0x32 => Self::Origin,
            0x33 => Self::Caller,
            0x34 => Self::CallValue,
            0x35 => Self::CallDataLoad,
            0x36 => Self::CallDataSize,
            0x37 => Self::CallDataCopy,
            0x38 => Self::CodeSize,
            0x39 => Self::CodeCopy,
            0x3A => Self::GasPrice,
            0x3B => Self::ExtCodeSize,
            0x3C => Self::ExtCodeCopy,
            0x3D => Self::ReturnDataSize,
            0x3E => Self::ReturnDataCopy,
            0x3F => Self::ExtCodeHash,
            0x40 => Self::BlockHash,
            0x41 => Self::Coinbase,
            0x42 => Self::Timestamp,
            0x43 => Self::Number,
            0x44 => Self::Difficulty,
            0x45 => Self::GasLimit,
            0x46 => Self::CallAssetId,
            0x50 => Self::Pop,
            0x51 => Self::MLoad,
            0x52 => Self::MStore,
            0x53 => Self::MStore8,
            0x54 => Self::SLoad,
            0x55 => Self::SStore,
            0x56 => Self::Jump,
            0x57 => Self::JumpI,
            0x58 => Self::Pc,
            0x59 => Self::MSize,
            0x5A => Self::Gas,
            0x5B => Self::JumpDest,
            0x60 => Self::Push1,
            0x61 => Self::Push2,
            0x62 => Self::Push3,
            0x63 => Self::Push4,
            0x64 => Self::Push5,
            0x65 => Self::Push6,
            0x66 => Self::Push7,
            0x67 => Self::Push8,
            0x68 => Self::Push9,
            0x69 => Self::Push10,
            0x6A => Self::Push11,
            0x6B => Self::Push12,
            0x6C => Self::Push13,
            0x6D => Self::Push14,
            0x6E => Self::Push15,
            0x6F => Self::Push16,
            0x70 => Self::Push17,
            0x71 => Self::Push18,
            0x72 => Self::Push19,
            0x73 => Self::Push20,
            0x74 => Self::Push21,
            0x75 => Self::Push22,
            0x76 => Self::Push23,
            0x77 => Self::Push24,
            0x78 => Self::Push25,
            0x79 => Self::Push26,
            0x7A => Self::Push27,
            0x7B => Self::Push28,
            0x7C => Self::Push29,
            0x7D => Self::Push30,
            0x7E => Self::Push31,
            0x7F => Self::Push32,
            0x80 => Self::Dup1,
            0x81 => Self::Dup2,
            0x82 => Self::Dup3,
            0x83 => Self::Dup4,
            0x84 => Self::Dup5,
            0x85 => Self::Dup6,
            0x86 => Self::Dup7,
            0x87 => Self::Dup8,
            0x88 => Self::Dup9,
            0x89 => Self::Dup10,
            0x8A => Self::Dup11,
            0x8B => Self::Dup12,
            0x8C => Self::Dup13,
            0x8D => Self::Dup14,
            0x8E => Self::Dup15,
            0x8F => Self::Dup16,
            0x90 => Self::Swap1,
            0x91 => Self::Swap2,
            0x92 => Self::Swap3,
            0x93 => Self::Swap4,
            0x94 => Self::Swap5,
            0x95 => Self::Swap6,
            0x96 => Self::Swap7,
            0x97 => Self::Swap8,
            0x98 => Self::Swap9,
            0x99 => Self::Swap10,
            0x9A => Self::Swap11,
            0x9B => Self::Swap12,
            0x9C => Self::Swap13,
            0x9D => Self::Swap14,
            0x9E => Self::Swap15,
            0x9F => Self::Swap16,
            0xA0 => Self::Log0,
            0xA1 => Self::Log1,
            0xA2 => Self::Log2,
            0xA3 => Self::Log3,
            0xA4 => Self::Log4,
            0xC0 => Self::BalanceEx,
            0xF0 => Self::Create,
            0xF1 => Self::Call,
            0xF2 => Self::CallCode,
            0xF3 => Self::Return,
            0xF4 => Self::DelegateCall,
            0xF6 => Self::PluginCall,
            0xFA => Self::StaticCall,
            0xFD => Self::Revert,
            0xFE => Self::Invalid,
            _ => return None,
        })
    }

    /// Raw byte value.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Number of immediate bytes following a PUSH opcode.
    #[must_use]
    pub const fn push_size(self) -> Option<usize> {
        let b = self as u8;
        if b >= 0x60 && b <= 0x7F {
            Some((b - 0x5F) as usize)
        } else {
            None
        }
    }

    /// True for opcodes that mutate state and are forbidden under a static
    /// call. CALL is handled separately since only value-bearing calls are
    /// forbidden.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::SStore
                | Self::Log0
                | Self::Log1
                | Self::Log2
                | Self::Log3
                | Self::Log4
                | Self::Create
                | Self::PluginCall
        )
    }

    /// True for opcodes that end the frame.
    #[must_use]
    pub const fn is_terminating(self) -> bool {
        matches!(self, Self::Stop | Self::Return | Self::Revert | Self::Invalid)
    }
}
