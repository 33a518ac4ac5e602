//! IEC 60870-5-104 APCI (Application Protocol Control Information).
//!
//! APCI is the 6-byte header of an APDU: start byte, length and the 4-byte
//! control field that selects the frame kind and carries sequence numbers.

use crate::error::{Iec104Error, Result};

/// Start byte for IEC 104 frames.
pub const START_BYTE: u8 = 0x68;

/// Minimum APDU content length (control field only, no ASDU).
pub const MIN_APDU_LENGTH: usize = 4;

/// Maximum APDU content length.
pub const MAX_APDU_LENGTH: usize = 253;

/// Control field length.
pub const CONTROL_FIELD_LENGTH: usize = 4;

/// APCI frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// I-frame: Information transfer
    IFrame,
    /// S-frame: Supervisory (acknowledgment)
    SFrame,
    /// U-frame: Unnumbered (control)
    UFrame,
}

/// U-frame function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UFunction {
    /// STARTDT act
    StartDtAct,
    /// STARTDT con
    StartDtCon,
    /// STOPDT act
    StopDtAct,
    /// STOPDT con
    StopDtCon,
    /// TESTFR act
    TestFrAct,
    /// TESTFR con
    TestFrCon,
    /// Well-formed U-frame whose command bits match none of the above.
    Unknown(u8),
}

impl UFunction {
    /// Get the control field byte for this U-function.
    #[inline]
    pub const fn control_byte(&self) -> u8 {
        match self {
            Self::StartDtAct => 0x07,
            Self::StartDtCon => 0x0B,
            Self::StopDtAct => 0x13,
            Self::StopDtCon => 0x23,
            Self::TestFrAct => 0x43,
            Self::TestFrCon => 0x83,
            Self::Unknown(byte) => *byte,
        }
    }

    /// Parse U-function from the first control byte.
    ///
    /// Fails only if the byte does not carry the U-frame marker (`xxxxxx11`).
    #[inline]
    pub fn from_control_byte(byte: u8) -> Result<Self> {
        if byte & 0x03 != 0x03 {
            return Err(Iec104Error::invalid_frame(format!(
                "control byte 0x{byte:02X} is not a U-frame"
            )));
        }
        Ok(match byte {
            0x07 => Self::StartDtAct,
            0x0B => Self::StartDtCon,
            0x13 => Self::StopDtAct,
            0x23 => Self::StopDtCon,
            0x43 => Self::TestFrAct,
            0x83 => Self::TestFrCon,
            other => Self::Unknown(other),
        })
    }

    /// Name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartDtAct => "STARTDT act",
            Self::StartDtCon => "STARTDT con",
            Self::StopDtAct => "STOPDT act",
            Self::StopDtCon => "STOPDT con",
            Self::TestFrAct => "TESTFR act",
            Self::TestFrCon => "TESTFR con",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// APCI control field.
///
/// ```text
/// +--------+--------+--------+--------+--------+--------+
/// | 0x68   | Length | CF1    | CF2    | CF3    | CF4    |
/// +--------+--------+--------+--------+--------+--------+
///
/// I: CF1..CF2 = LE(ssn << 1), CF3..CF4 = LE(rsn << 1)
/// S: CF1..CF2 = 01 00,        CF3..CF4 = LE(rsn << 1)
/// U: CF1 = command,           CF2..CF4 = 00
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Apci {
    /// I-frame with send and receive sequence numbers.
    IFrame {
        /// Send sequence number (0-32767)
        send_seq: u16,
        /// Receive sequence number (0-32767)
        recv_seq: u16,
    },
    /// S-frame with receive sequence number only.
    SFrame {
        /// Receive sequence number (0-32767)
        recv_seq: u16,
    },
    /// U-frame with function code.
    UFrame {
        /// U-frame function
        function: UFunction,
    },
}

impl Apci {
    /// Create a new I-frame APCI.
    #[inline]
    pub fn i_frame(send_seq: u16, recv_seq: u16) -> Self {
        Self::IFrame { send_seq, recv_seq }
    }

    /// Create a new S-frame APCI.
    #[inline]
    pub fn s_frame(recv_seq: u16) -> Self {
        Self::SFrame { recv_seq }
    }

    /// Create a new U-frame APCI.
    #[inline]
    pub fn u_frame(function: UFunction) -> Self {
        Self::UFrame { function }
    }

    /// Get the frame type.
    #[inline]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::IFrame { .. } => FrameType::IFrame,
            Self::SFrame { .. } => FrameType::SFrame,
            Self::UFrame { .. } => FrameType::UFrame,
        }
    }

    /// Parse APCI from the 4-byte control field.
    #[inline]
    pub fn parse(control: &[u8]) -> Result<Self> {
        if control.len() < CONTROL_FIELD_LENGTH {
            return Err(Iec104Error::invalid_frame(format!(
                "control field too short: {} bytes",
                control.len()
            )));
        }

        let cf1 = control[0];
        let high = u16::from_le_bytes([control[0], control[1]]) >> 1;
        let low = u16::from_le_bytes([control[2], control[3]]) >> 1;

        match cf1 & 0x03 {
            0x00 | 0x02 => Ok(Self::IFrame {
                send_seq: high,
                recv_seq: low,
            }),
            0x01 => Ok(Self::SFrame { recv_seq: low }),
            _ => Ok(Self::UFrame {
                function: UFunction::from_control_byte(cf1)?,
            }),
        }
    }

    /// Encode APCI to the 4-byte control field.
    #[inline]
    pub fn encode(&self) -> [u8; 4] {
        match self {
            Self::IFrame { send_seq, recv_seq } => {
                let [cf1, cf2] = pack_seq(*send_seq);
                let [cf3, cf4] = pack_seq(*recv_seq);
                [cf1, cf2, cf3, cf4]
            }
            Self::SFrame { recv_seq } => {
                let [cf3, cf4] = pack_seq(*recv_seq);
                [0x01, 0x00, cf3, cf4]
            }
            Self::UFrame { function } => [function.control_byte(), 0x00, 0x00, 0x00],
        }
    }

    /// Encode full APDU header (start + length + control).
    ///
    /// `asdu_len` is the length of the ASDU that follows (0 for S/U frames).
    #[inline]
    pub fn encode_header(&self, asdu_len: usize) -> [u8; 6] {
        let control = self.encode();
        let apdu_len = (CONTROL_FIELD_LENGTH + asdu_len) as u8;
        [
            START_BYTE, apdu_len, control[0], control[1], control[2], control[3],
        ]
    }

    /// Check if this is an I-frame.
    #[inline]
    pub fn is_i_frame(&self) -> bool {
        matches!(self, Self::IFrame { .. })
    }

    /// Check if this is an S-frame.
    #[inline]
    pub fn is_s_frame(&self) -> bool {
        matches!(self, Self::SFrame { .. })
    }

    /// Check if this is a U-frame.
    #[inline]
    pub fn is_u_frame(&self) -> bool {
        matches!(self, Self::UFrame { .. })
    }

    /// Get the send sequence number (I-frame only).
    #[inline]
    pub fn send_seq(&self) -> Option<u16> {
        match self {
            Self::IFrame { send_seq, .. } => Some(*send_seq),
            _ => None,
        }
    }

    /// Get the receive sequence number (I-frame and S-frame).
    #[inline]
    pub fn recv_seq(&self) -> Option<u16> {
        match self {
            Self::IFrame { recv_seq, .. } | Self::SFrame { recv_seq } => Some(*recv_seq),
            _ => None,
        }
    }
}

/// Pack a 15-bit sequence number as little-endian `n << 1`.
#[inline]
fn pack_seq(seq: u16) -> [u8; 2] {
    ((seq & 0x7FFF) << 1).to_le_bytes()
}

impl std::fmt::Display for Apci {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IFrame { send_seq, recv_seq } => {
                write!(f, "I(S={}, R={})", send_seq, recv_seq)
            }
            Self::SFrame { recv_seq } => write!(f, "S(R={})", recv_seq),
            Self::UFrame {
                function: UFunction::Unknown(byte),
            } => write!(f, "U(0x{:02X})", byte),
            Self::UFrame { function } => write!(f, "U({})", function.name()),
        }
    }
}
