//! IEC 60870-5-104 codec for tokio.
//!
//! Frames are `0x68 | length | control(4) | ASDU?`. The decoder accumulates
//! partial reads until the declared content length is buffered. A bad start
//! byte or length is a hard error: a misaligned byte stream cannot be
//! recovered without guessing, so the decoder never skips bytes.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Iec104Error;
use crate::types::{
    Apci, Asdu, UFunction, CONTROL_FIELD_LENGTH, MAX_APDU_LENGTH, MIN_APDU_LENGTH, START_BYTE,
};

/// Start byte plus length byte.
pub const HEADER_LENGTH: usize = 2;

/// An IEC 104 APDU (Application Protocol Data Unit).
///
/// Contains the APCI header and optionally an ASDU (for I-frames).
#[derive(Debug, Clone, PartialEq)]
pub struct Apdu {
    /// APCI (Application Protocol Control Information)
    pub apci: Apci,
    /// ASDU (Application Service Data Unit) - only present in I-frames
    pub asdu: Option<Asdu>,
}

impl Apdu {
    /// Create a new I-frame APDU with ASDU.
    pub fn i_frame(send_seq: u16, recv_seq: u16, asdu: Asdu) -> Self {
        Self {
            apci: Apci::i_frame(send_seq, recv_seq),
            asdu: Some(asdu),
        }
    }

    /// Create a new S-frame APDU.
    pub fn s_frame(recv_seq: u16) -> Self {
        Self {
            apci: Apci::s_frame(recv_seq),
            asdu: None,
        }
    }

    /// Create a new U-frame APDU.
    pub fn u_frame(function: UFunction) -> Self {
        Self {
            apci: Apci::u_frame(function),
            asdu: None,
        }
    }

    /// Parse the content that follows the length byte.
    pub fn parse(content: &[u8]) -> Result<Self, Iec104Error> {
        let apci = Apci::parse(content)?;
        let body = &content[CONTROL_FIELD_LENGTH..];

        let asdu = match apci {
            Apci::IFrame { .. } => Some(Asdu::parse(body)?),
            _ if !body.is_empty() => {
                return Err(Iec104Error::invalid_frame(format!(
                    "{} carries {} unexpected bytes",
                    apci,
                    body.len()
                )))
            }
            _ => None,
        };

        Ok(Self { apci, asdu })
    }

    /// Encode into a standalone byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Iec104Error> {
        let mut buf = BytesMut::new();
        Iec104Codec::new().encode(self.clone(), &mut buf)?;
        Ok(buf.to_vec())
    }

    /// Check if this is an I-frame.
    pub fn is_i_frame(&self) -> bool {
        self.apci.is_i_frame()
    }

    /// Check if this is an S-frame.
    pub fn is_s_frame(&self) -> bool {
        self.apci.is_s_frame()
    }

    /// Check if this is a U-frame.
    pub fn is_u_frame(&self) -> bool {
        self.apci.is_u_frame()
    }
}

impl std::fmt::Display for Apdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.apci)?;
        if let Some(asdu) = &self.asdu {
            write!(
                f,
                " [{}] COT={} CA={}",
                asdu.header.type_id, asdu.header.cot, asdu.header.common_address
            )?;
        }
        Ok(())
    }
}

/// IEC 60870-5-104 codec.
///
/// # Example
///
/// ```rust,ignore
/// use tokio_util::codec::Framed;
/// use voltage_iec104_client::codec::Iec104Codec;
///
/// let stream = TcpStream::connect("192.168.1.100:2404").await?;
/// let mut framed = Framed::new(stream, Iec104Codec::new());
/// framed.send(Apdu::u_frame(UFunction::StartDtAct)).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Iec104Codec {
    state: DecodeState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DecodeState {
    #[default]
    WaitingForHeader,
    WaitingForContent {
        length: usize,
    },
}

impl Iec104Codec {
    /// Create a new IEC 104 codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a header has been accepted and its content is incomplete.
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::WaitingForContent { .. })
    }
}

impl Decoder for Iec104Codec {
    type Item = Apdu;
    type Error = Iec104Error;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        if let DecodeState::WaitingForHeader = self.state {
            if src.len() < HEADER_LENGTH {
                return Ok(None);
            }
            if src[0] != START_BYTE {
                return Err(Iec104Error::invalid_frame(format!(
                    "unexpected start byte 0x{:02X}",
                    src[0]
                )));
            }
            let length = src[1] as usize;
            if !(MIN_APDU_LENGTH..=MAX_APDU_LENGTH).contains(&length) {
                return Err(Iec104Error::invalid_frame(format!(
                    "declared length {} out of range",
                    length
                )));
            }
            self.state = DecodeState::WaitingForContent { length };
        }

        let DecodeState::WaitingForContent { length } = self.state else {
            return Ok(None);
        };

        let total_length = HEADER_LENGTH + length;
        if src.len() < total_length {
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total_length);
        self.state = DecodeState::WaitingForHeader;
        Apdu::parse(&frame[HEADER_LENGTH..]).map(Some)
    }
}

impl Encoder<Apdu> for Iec104Codec {
    type Error = Iec104Error;

    fn encode(&mut self, item: Apdu, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        let asdu_len = item.asdu.as_ref().map(|a| a.encoded_len()).unwrap_or(0);

        let content_len = CONTROL_FIELD_LENGTH + asdu_len;
        if content_len > MAX_APDU_LENGTH {
            return Err(Iec104Error::FrameTooLarge(content_len));
        }

        dst.reserve(HEADER_LENGTH + content_len);
        dst.extend_from_slice(&item.apci.encode_header(asdu_len));

        if let Some(asdu) = &item.asdu {
            asdu.encode_to(dst);
        }

        Ok(())
    }
}
