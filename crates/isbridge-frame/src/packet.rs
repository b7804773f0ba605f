//! Packet types and well-known data identifiers.
//!
//! The packet type lives in the low nibble of the header flags byte. The
//! data identifier names the schema of the payload; its field layout belongs
//! to the device message catalog and is opaque to this crate.

use std::fmt;

use crate::error::FrameError;

/// Mask selecting the packet type from the header flags byte.
pub const PACKET_TYPE_MASK: u8 = 0x0F;

/// Packet type carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Acknowledgement; the payload echoes the acknowledged request.
    Ack = 1,
    /// Negative acknowledgement.
    Nack = 2,
    /// Request for a data set.
    GetData = 3,
    /// Data set contents.
    Data = 4,
    /// Command: write (and persist) a data set.
    SetData = 5,
    /// Stop all broadcasts on every port.
    StopBroadcastsAllPorts = 6,
    /// Stop the broadcast of one data identifier.
    StopDidBroadcast = 7,
    /// Stop all broadcasts on the current port.
    StopBroadcastsCurrentPort = 8,
}

impl PacketType {
    /// Whether frames of this type carry payload bytes for the caller.
    pub fn carries_payload(self) -> bool {
        matches!(self, PacketType::Data | PacketType::SetData | PacketType::Ack)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Ack => "ACK",
            PacketType::Nack => "NACK",
            PacketType::GetData => "GET_DATA",
            PacketType::Data => "DATA",
            PacketType::SetData => "SET_DATA",
            PacketType::StopBroadcastsAllPorts => "STOP_ALL",
            PacketType::StopDidBroadcast => "STOP_DID",
            PacketType::StopBroadcastsCurrentPort => "STOP_PORT",
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = FrameError;

    fn try_from(flags: u8) -> Result<Self, Self::Error> {
        Ok(match flags & PACKET_TYPE_MASK {
            1 => PacketType::Ack,
            2 => PacketType::Nack,
            3 => PacketType::GetData,
            4 => PacketType::Data,
            5 => PacketType::SetData,
            6 => PacketType::StopBroadcastsAllPorts,
            7 => PacketType::StopDidBroadcast,
            8 => PacketType::StopBroadcastsCurrentPort,
            other => return Err(FrameError::UnknownPacketType(other)),
        })
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric code naming the semantic schema of a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DataId(pub u8);

impl DataId {
    pub const NULL: DataId = DataId(0);
    pub const DEV_INFO: DataId = DataId(1);
    pub const SYS_FAULT: DataId = DataId(2);
    pub const PIMU: DataId = DataId(3);
    pub const INS_1: DataId = DataId(4);
    pub const INS_2: DataId = DataId(5);
    pub const SYS_CMD: DataId = DataId(7);
    pub const FLASH_CONFIG: DataId = DataId(12);

    /// Catalog name when the identifier is one of the well-known ones.
    pub fn name(self) -> &'static str {
        match self {
            DataId::NULL => "NULL",
            DataId::DEV_INFO => "DEV_INFO",
            DataId::SYS_FAULT => "SYS_FAULT",
            DataId::PIMU => "PIMU",
            DataId::INS_1 => "INS_1",
            DataId::INS_2 => "INS_2",
            DataId::SYS_CMD => "SYS_CMD",
            DataId::FLASH_CONFIG => "FLASH_CONFIG",
            _ => "OTHER",
        }
    }
}

impl From<u8> for DataId {
    fn from(value: u8) -> Self {
        DataId(value)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}
