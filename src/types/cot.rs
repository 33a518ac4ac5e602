//! IEC 60870-5-104 Cause of Transmission (COT).
//!
//! The cause occupies the low 6 bits of the COT byte; bit 6 is the P/N
//! (negative confirmation) flag and bit 7 the test flag. Those flags live on
//! [`AsduHeader`](super::AsduHeader), not here.

/// Cause of Transmission (COT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cot {
    /// Periodic, cyclic (1)
    Periodic,
    /// Background scan (2)
    Background,
    /// Spontaneous (3)
    Spontaneous,
    /// Initialized (4)
    Initialized,
    /// Request or requested (5)
    Request,
    /// Activation (6)
    Activation,
    /// Activation confirmation (7)
    ActivationConfirm,
    /// Deactivation (8)
    Deactivation,
    /// Deactivation confirmation (9)
    DeactivationConfirm,
    /// Activation termination (10)
    ActivationTermination,
    /// Return information caused by a remote command (11)
    ReturnRemoteCommand,
    /// Return information caused by a local command (12)
    ReturnLocalCommand,
    /// File transfer (13)
    FileTransfer,
    /// Interrogated by station interrogation (20)
    InterrogatedByStation,
    /// Interrogated by group interrogation 1..=16 (21..=36)
    InterrogatedByGroup(u8),
    /// Requested by general counter request (37)
    RequestedByGeneralCounter,
    /// Requested by counter group request 1..=4 (38..=41)
    RequestedByCounterGroup(u8),
    /// Unknown type identification (44)
    UnknownTypeId,
    /// Unknown cause of transmission (45)
    UnknownCot,
    /// Unknown common address of ASDU (46)
    UnknownCommonAddress,
    /// Unknown information object address (47)
    UnknownIoa,
    /// Reserved or private cause value.
    Other(u8),
}

impl Cot {
    /// Create COT from raw byte value; only the lower 6 bits are used.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x3F {
            1 => Self::Periodic,
            2 => Self::Background,
            3 => Self::Spontaneous,
            4 => Self::Initialized,
            5 => Self::Request,
            6 => Self::Activation,
            7 => Self::ActivationConfirm,
            8 => Self::Deactivation,
            9 => Self::DeactivationConfirm,
            10 => Self::ActivationTermination,
            11 => Self::ReturnRemoteCommand,
            12 => Self::ReturnLocalCommand,
            13 => Self::FileTransfer,
            20 => Self::InterrogatedByStation,
            group @ 21..=36 => Self::InterrogatedByGroup(group - 20),
            37 => Self::RequestedByGeneralCounter,
            group @ 38..=41 => Self::RequestedByCounterGroup(group - 37),
            44 => Self::UnknownTypeId,
            45 => Self::UnknownCot,
            46 => Self::UnknownCommonAddress,
            47 => Self::UnknownIoa,
            other => Self::Other(other),
        }
    }

    /// Convert to raw 6-bit cause value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Periodic => 1,
            Self::Background => 2,
            Self::Spontaneous => 3,
            Self::Initialized => 4,
            Self::Request => 5,
            Self::Activation => 6,
            Self::ActivationConfirm => 7,
            Self::Deactivation => 8,
            Self::DeactivationConfirm => 9,
            Self::ActivationTermination => 10,
            Self::ReturnRemoteCommand => 11,
            Self::ReturnLocalCommand => 12,
            Self::FileTransfer => 13,
            Self::InterrogatedByStation => 20,
            Self::InterrogatedByGroup(group) => 20 + group,
            Self::RequestedByGeneralCounter => 37,
            Self::RequestedByCounterGroup(group) => 37 + group,
            Self::UnknownTypeId => 44,
            Self::UnknownCot => 45,
            Self::UnknownCommonAddress => 46,
            Self::UnknownIoa => 47,
            Self::Other(value) => value & 0x3F,
        }
    }

    /// Check if this COT answers an interrogation.
    #[inline]
    pub const fn is_interrogation_response(&self) -> bool {
        matches!(self, Self::InterrogatedByStation | Self::InterrogatedByGroup(_))
    }

    /// Check if this COT answers a counter interrogation.
    #[inline]
    pub const fn is_counter_response(&self) -> bool {
        matches!(
            self,
            Self::RequestedByGeneralCounter | Self::RequestedByCounterGroup(_)
        )
    }
}

impl std::fmt::Display for Cot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InterrogatedByGroup(group) => write!(f, "InterrogatedByGroup{}", group),
            Self::RequestedByCounterGroup(group) => write!(f, "RequestedByGroup{}Counter", group),
            Self::Other(value) => write!(f, "Cot({})", value),
            other => write!(f, "{:?}", other),
        }
    }
}
