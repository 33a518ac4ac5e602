//! IEC 60870-5-104 Type Identification.
//!
//! The client only acts on the two interrogation commands; every other type
//! is carried through to the application untouched.

/// IEC 60870-5-104 Type Identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    /// Single-point information (M_SP_NA_1)
    SinglePoint,
    /// Double-point information (M_DP_NA_1)
    DoublePoint,
    /// Step position information (M_ST_NA_1)
    StepPosition,
    /// Bitstring of 32 bit (M_BO_NA_1)
    Bitstring32,
    /// Measured value, normalized (M_ME_NA_1)
    MeasuredNormalized,
    /// Measured value, scaled (M_ME_NB_1)
    MeasuredScaled,
    /// Measured value, short floating point (M_ME_NC_1)
    MeasuredFloat,
    /// Integrated totals (M_IT_NA_1)
    IntegratedTotals,
    /// Single-point information with CP56Time2a (M_SP_TB_1)
    SinglePointTime56,
    /// Double-point information with CP56Time2a (M_DP_TB_1)
    DoublePointTime56,
    /// Measured value, short float with CP56Time2a (M_ME_TF_1)
    MeasuredFloatTime56,
    /// Integrated totals with CP56Time2a (M_IT_TB_1)
    IntegratedTotalsTime56,
    /// End of initialization (M_EI_NA_1)
    EndOfInit,
    /// Interrogation command (C_IC_NA_1), the "total call"
    InterrogationCommand,
    /// Counter interrogation command (C_CI_NA_1), the electricity total call
    CounterInterrogation,
    /// Clock synchronization command (C_CS_NA_1)
    ClockSync,
    /// Any other type identifier, kept as the raw byte.
    Other(u8),
}

impl TypeId {
    /// Create TypeId from raw byte value.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SinglePoint,
            3 => Self::DoublePoint,
            5 => Self::StepPosition,
            7 => Self::Bitstring32,
            9 => Self::MeasuredNormalized,
            11 => Self::MeasuredScaled,
            13 => Self::MeasuredFloat,
            15 => Self::IntegratedTotals,
            30 => Self::SinglePointTime56,
            31 => Self::DoublePointTime56,
            36 => Self::MeasuredFloatTime56,
            37 => Self::IntegratedTotalsTime56,
            70 => Self::EndOfInit,
            100 => Self::InterrogationCommand,
            101 => Self::CounterInterrogation,
            103 => Self::ClockSync,
            other => Self::Other(other),
        }
    }

    /// Convert to raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::SinglePoint => 1,
            Self::DoublePoint => 3,
            Self::StepPosition => 5,
            Self::Bitstring32 => 7,
            Self::MeasuredNormalized => 9,
            Self::MeasuredScaled => 11,
            Self::MeasuredFloat => 13,
            Self::IntegratedTotals => 15,
            Self::SinglePointTime56 => 30,
            Self::DoublePointTime56 => 31,
            Self::MeasuredFloatTime56 => 36,
            Self::IntegratedTotalsTime56 => 37,
            Self::EndOfInit => 70,
            Self::InterrogationCommand => 100,
            Self::CounterInterrogation => 101,
            Self::ClockSync => 103,
            Self::Other(value) => value,
        }
    }

    /// Get the IEC standard name (e.g., "M_SP_NA_1").
    pub const fn standard_name(&self) -> &'static str {
        match self {
            Self::SinglePoint => "M_SP_NA_1",
            Self::DoublePoint => "M_DP_NA_1",
            Self::StepPosition => "M_ST_NA_1",
            Self::Bitstring32 => "M_BO_NA_1",
            Self::MeasuredNormalized => "M_ME_NA_1",
            Self::MeasuredScaled => "M_ME_NB_1",
            Self::MeasuredFloat => "M_ME_NC_1",
            Self::IntegratedTotals => "M_IT_NA_1",
            Self::SinglePointTime56 => "M_SP_TB_1",
            Self::DoublePointTime56 => "M_DP_TB_1",
            Self::MeasuredFloatTime56 => "M_ME_TF_1",
            Self::IntegratedTotalsTime56 => "M_IT_TB_1",
            Self::EndOfInit => "M_EI_NA_1",
            Self::InterrogationCommand => "C_IC_NA_1",
            Self::CounterInterrogation => "C_CI_NA_1",
            Self::ClockSync => "C_CS_NA_1",
            Self::Other(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(value) => write!(f, "TYPE_{}", value),
            _ => f.write_str(self.standard_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrogation_type_codes() {
        assert_eq!(TypeId::InterrogationCommand.as_u8(), 0x64);
        assert_eq!(TypeId::CounterInterrogation.as_u8(), 0x65);
        assert_eq!(TypeId::from_u8(0x64), TypeId::InterrogationCommand);
        assert_eq!(TypeId::from_u8(0x65), TypeId::CounterInterrogation);
    }

    #[test]
    fn test_all_bytes_roundtrip() {
        for value in 0..=u8::MAX {
            assert_eq!(TypeId::from_u8(value).as_u8(), value);
        }
    }

    #[test]
    fn test_unknown_type_is_kept() {
        assert_eq!(TypeId::from_u8(200), TypeId::Other(200));
        assert_eq!(TypeId::Other(200).to_string(), "TYPE_200");
        assert_eq!(TypeId::MeasuredFloat.to_string(), "M_ME_NC_1");
    }
}
