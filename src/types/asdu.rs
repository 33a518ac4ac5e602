//! IEC 60870-5-104 ASDU (Application Service Data Unit).
//!
//! Only the fixed header is interpreted. Information objects of received
//! ASDUs stay in `raw_data` for the application to decode.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Iec104Error, Result};
use crate::types::{Cot, TypeId};

/// Encoded size of the ASDU header (2-byte common address profile).
pub const ASDU_HEADER_LENGTH: usize = 6;

/// Qualifier of interrogation: station interrogation.
pub const QOI_STATION: u8 = 20;

/// Qualifier of counter interrogation used for the electricity total call.
pub const QCC_GENERAL_READ: u8 = 5;

/// Variable Structure Qualifier (VSQ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vsq {
    /// Number of information objects (0-127)
    pub count: u8,
    /// If true, addresses are sequential (SQ=1)
    pub sequence: bool,
}

impl Vsq {
    /// Create a new VSQ.
    #[inline]
    pub const fn new(count: u8, sequence: bool) -> Self {
        Self { count, sequence }
    }

    /// Parse VSQ from byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            count: value & 0x7F,
            sequence: (value & 0x80) != 0,
        }
    }

    /// Encode VSQ to byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        (self.count & 0x7F) | if self.sequence { 0x80 } else { 0 }
    }
}

/// Information Object Address (IOA), 3 bytes little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ioa(pub u32);

impl Ioa {
    /// Create IOA from u32 (lower 24 bits).
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value & 0x00FF_FFFF)
    }

    /// Encode IOA to 3 bytes (little-endian).
    #[inline]
    pub fn to_bytes(&self) -> [u8; 3] {
        let [b0, b1, b2, _] = self.0.to_le_bytes();
        [b0, b1, b2]
    }

    /// Get the raw value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// ASDU header (fixed part).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsduHeader {
    /// Type identification
    pub type_id: TypeId,
    /// Variable structure qualifier
    pub vsq: Vsq,
    /// Cause of transmission
    pub cot: Cot,
    /// Test flag
    pub test: bool,
    /// Negative confirmation flag (P/N)
    pub negative: bool,
    /// Originator address (0 if not used)
    pub originator: u8,
    /// Common address of ASDU (station address)
    pub common_address: u16,
}

impl AsduHeader {
    /// Create a new ASDU header.
    pub fn new(type_id: TypeId, count: u8, cot: Cot, common_address: u16) -> Self {
        Self {
            type_id,
            vsq: Vsq::new(count, false),
            cot,
            test: false,
            negative: false,
            originator: 0,
            common_address,
        }
    }

    /// Parse ASDU header from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ASDU_HEADER_LENGTH {
            return Err(Iec104Error::invalid_asdu(format!(
                "ASDU header too short: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            type_id: TypeId::from_u8(data[0]),
            vsq: Vsq::from_u8(data[1]),
            cot: Cot::from_u8(data[2]),
            test: (data[2] & 0x80) != 0,
            negative: (data[2] & 0x40) != 0,
            originator: data[3],
            common_address: u16::from_le_bytes([data[4], data[5]]),
        })
    }

    /// Encode ASDU header to bytes.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.type_id.as_u8());
        buf.put_u8(self.vsq.as_u8());

        let mut cot_byte = self.cot.as_u8();
        if self.test {
            cot_byte |= 0x80;
        }
        if self.negative {
            cot_byte |= 0x40;
        }
        buf.put_u8(cot_byte);
        buf.put_u8(self.originator);
        buf.put_u16_le(self.common_address);
    }
}

/// Information object (generic container).
#[derive(Debug, Clone, PartialEq)]
pub struct InformationObject {
    /// Information object address
    pub ioa: Ioa,
    /// Raw element bytes following the address
    pub data: Bytes,
}

impl InformationObject {
    /// Create a new information object.
    pub fn new(ioa: Ioa, data: Bytes) -> Self {
        Self { ioa, data }
    }
}

/// Complete ASDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    /// ASDU header
    pub header: AsduHeader,
    /// Information objects (outgoing ASDUs)
    pub objects: Vec<InformationObject>,
    /// Undecoded information objects (received ASDUs)
    pub raw_data: Bytes,
}

impl Asdu {
    /// Create a new ASDU.
    pub fn new(header: AsduHeader) -> Self {
        Self {
            header,
            objects: Vec::new(),
            raw_data: Bytes::new(),
        }
    }

    /// Create an interrogation command (C_IC_NA_1) activation.
    pub fn interrogation_command(common_address: u16, qoi: u8) -> Self {
        Self::single_qualifier_command(TypeId::InterrogationCommand, common_address, qoi)
    }

    /// Create a counter interrogation command (C_CI_NA_1) activation.
    pub fn counter_interrogation_command(common_address: u16, qcc: u8) -> Self {
        Self::single_qualifier_command(TypeId::CounterInterrogation, common_address, qcc)
    }

    fn single_qualifier_command(type_id: TypeId, common_address: u16, qualifier: u8) -> Self {
        let mut asdu = Self::new(AsduHeader::new(
            type_id,
            1,
            Cot::Activation,
            common_address,
        ));
        asdu.objects.push(InformationObject::new(
            Ioa::new(0),
            Bytes::copy_from_slice(&[qualifier]),
        ));
        asdu
    }

    /// Parse ASDU from bytes (after APCI).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = AsduHeader::parse(data)?;
        Ok(Self {
            header,
            objects: Vec::new(),
            raw_data: Bytes::copy_from_slice(&data[ASDU_HEADER_LENGTH..]),
        })
    }

    /// Type identification shortcut.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.header.type_id
    }

    /// Cause of transmission shortcut.
    #[inline]
    pub fn cot(&self) -> Cot {
        self.header.cot
    }

    /// Encode ASDU directly into the provided buffer.
    #[inline]
    pub fn encode_to(&self, buf: &mut BytesMut) {
        self.header.encode(buf);

        for obj in &self.objects {
            buf.put_slice(&obj.ioa.to_bytes());
            buf.put_slice(&obj.data);
        }

        if self.objects.is_empty() {
            buf.put_slice(&self.raw_data);
        }
    }

    /// Calculate the encoded length of this ASDU.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        let objects: usize = if self.objects.is_empty() {
            self.raw_data.len()
        } else {
            self.objects.iter().map(|obj| 3 + obj.data.len()).sum()
        };
        ASDU_HEADER_LENGTH + objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(asdu: &Asdu) -> Vec<u8> {
        let mut buf = BytesMut::new();
        asdu.encode_to(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_vsq() {
        assert_eq!(Vsq::new(10, true).as_u8(), 0x8A);

        let vsq = Vsq::from_u8(0x8A);
        assert_eq!(vsq.count, 10);
        assert!(vsq.sequence);
    }

    #[test]
    fn test_ioa_bytes() {
        assert_eq!(Ioa::new(0x123456).to_bytes(), [0x56, 0x34, 0x12]);
        assert_eq!(Ioa::new(0xFF00_0001).value(), 1);
    }

    #[test]
    fn test_station_interrogation_bytes() {
        let asdu = Asdu::interrogation_command(1, QOI_STATION);
        assert_eq!(
            encode(&asdu),
            [0x64, 0x01, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x14]
        );
        assert_eq!(asdu.encoded_len(), 10);
    }

    #[test]
    fn test_electricity_interrogation_bytes() {
        let asdu = Asdu::counter_interrogation_command(1, QCC_GENERAL_READ);
        assert_eq!(
            encode(&asdu),
            [0x65, 0x01, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x05]
        );
    }

    #[test]
    fn test_header_flags() {
        // M_ME_NC_1, 1 object, cause 7 with P/N set, test set, CA 0x0203
        let header = AsduHeader::parse(&[0x0D, 0x01, 0xC7, 0x00, 0x03, 0x02]).unwrap();
        assert_eq!(header.type_id, TypeId::MeasuredFloat);
        assert_eq!(header.cot, Cot::ActivationConfirm);
        assert!(header.negative);
        assert!(header.test);
        assert_eq!(header.common_address, 0x0203);

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &[0x0D, 0x01, 0xC7, 0x00, 0x03, 0x02]);
    }

    #[test]
    fn test_parse_keeps_raw_objects() {
        let bytes = [0x0D, 0x01, 0x03, 0x00, 0x01, 0x00, 0x01, 0x40, 0x00, 0, 0, 0x80, 0x3F, 0x00];
        let asdu = Asdu::parse(&bytes).unwrap();
        assert_eq!(asdu.type_id(), TypeId::MeasuredFloat);
        assert_eq!(asdu.cot(), Cot::Spontaneous);
        assert_eq!(&asdu.raw_data[..], &bytes[ASDU_HEADER_LENGTH..]);
        assert_eq!(encode(&asdu), bytes);
    }

    #[test]
    fn test_parse_short_header() {
        assert!(matches!(
            Asdu::parse(&[0x64, 0x01, 0x07]),
            Err(Iec104Error::InvalidAsdu(_))
        ));
    }
}
