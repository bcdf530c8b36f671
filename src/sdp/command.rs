//! Serial download protocol command records.
//!
//! A command is a 17 byte HID report. All multi-byte fields are big-endian,
//! whatever the host byte order:
//!
//! ```text
//!  0     1      3        7       8        12       16   17
//!  +-----+------+--------+-------+--------+--------+----+
//!  | id  | type | addr   | fmt   | count  | data   | -- |
//!  +-----+------+--------+-------+--------+--------+----+
//! ```
//!
//! The command type is sent twice, once per byte of the type field.

use std::fmt;

/// Size of a command report, report id included.
pub const CMD_SIZE: usize = 17;

/// Size of a data report: the report id and up to `BUF_SIZE - 1` payload
/// bytes.
pub const BUF_SIZE: usize = 1025;

/// Report id of command reports.
pub const REPORT_COMMAND: u8 = 1;
/// Report id of data reports.
pub const REPORT_DATA: u8 = 2;
/// Report id of the security (HAB) mode report sent after every command.
pub const REPORT_HAB_MODE: u8 = 3;
/// Report id of the completion status report.
pub const REPORT_STATUS: u8 = 4;

/// Data format tag for 32-bit accesses.
pub const FORMAT_32BIT: u8 = 0x20;

/// Status word of a completed file write.
pub const WRITE_FILE_COMPLETE: u32 = 0x8888_8888;
/// Status word of a completed DCD or register write.
pub const WRITE_COMPLETE: u32 = 0x12a8_a812;

/// Boot ROM operation selected by a command record.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CommandType {
    WriteRegister,
    GetStatus,
    WriteFile,
    DcdWrite,
    JumpAddress,
}
impl CommandType {
    pub fn code(self) -> u8 {
        match self {
            CommandType::WriteRegister => 0x02,
            CommandType::WriteFile => 0x04,
            CommandType::GetStatus => 0x05,
            CommandType::DcdWrite => 0x0a,
            CommandType::JumpAddress => 0x0b,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x02 => Some(CommandType::WriteRegister),
            0x04 => Some(CommandType::WriteFile),
            0x05 => Some(CommandType::GetStatus),
            0x0a => Some(CommandType::DcdWrite),
            0x0b => Some(CommandType::JumpAddress),
            _ => None,
        }
    }

    /// Status word the device reports once the command completed, for the
    /// commands that have one.
    pub fn completion(self) -> Option<u32> {
        match self {
            CommandType::WriteFile => Some(WRITE_FILE_COMPLETE),
            CommandType::DcdWrite | CommandType::WriteRegister => Some(WRITE_COMPLETE),
            CommandType::GetStatus | CommandType::JumpAddress => None,
        }
    }
}
impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandType::WriteRegister => "write_register",
            CommandType::GetStatus => "get_status",
            CommandType::WriteFile => "write_file",
            CommandType::DcdWrite => "dcd_write",
            CommandType::JumpAddress => "jump_address",
        };
        f.write_str(name)
    }
}

/// One boot ROM command. Built per call and encoded right away.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SdpCommand {
    pub kind: CommandType,
    pub address: u32,
    pub format: u8,
    pub count: u32,
    pub data: u32,
}
impl SdpCommand {
    fn new(kind: CommandType) -> Self {
        SdpCommand {
            kind,
            address: 0,
            format: 0,
            count: 0,
            data: 0,
        }
    }

    pub fn write_file(address: u32, size: u32) -> Self {
        SdpCommand {
            address,
            count: size,
            format: FORMAT_32BIT,
            ..Self::new(CommandType::WriteFile)
        }
    }

    pub fn dcd_write(address: u32, size: u32) -> Self {
        SdpCommand {
            address,
            count: size,
            ..Self::new(CommandType::DcdWrite)
        }
    }

    pub fn jump(address: u32) -> Self {
        SdpCommand {
            address,
            format: FORMAT_32BIT,
            ..Self::new(CommandType::JumpAddress)
        }
    }

    pub fn status() -> Self {
        Self::new(CommandType::GetStatus)
    }

    pub fn write_register(address: u32, value: u32) -> Self {
        SdpCommand {
            address,
            format: FORMAT_32BIT,
            count: 4,
            data: value,
            ..Self::new(CommandType::WriteRegister)
        }
    }

    /// The command report, report id included.
    pub fn encode(&self) -> [u8; CMD_SIZE] {
        let mut b = [0u8; CMD_SIZE];
        b[0] = REPORT_COMMAND;
        b[1] = self.kind.code();
        b[2] = self.kind.code();
        b[3..7].copy_from_slice(&self.address.to_be_bytes());
        b[7] = self.format;
        b[8..12].copy_from_slice(&self.count.to_be_bytes());
        b[12..16].copy_from_slice(&self.data.to_be_bytes());
        b
    }

    /// Parse a command report. Returns `None` for anything that is not a
    /// well formed command.
    pub fn decode(b: &[u8]) -> Option<Self> {
        if b.len() < CMD_SIZE || b[0] != REPORT_COMMAND || b[1] != b[2] {
            return None;
        }
        Some(SdpCommand {
            kind: CommandType::from_code(b[1])?,
            address: be_u32(&b[3..7]),
            format: b[7],
            count: be_u32(&b[8..12]),
            data: be_u32(&b[12..16]),
        })
    }
}

/// Big-endian word from the first four bytes of `b`.
pub(crate) fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

// =============================================================================
// Unit Tests
// =============================================================================
