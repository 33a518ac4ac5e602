//! Send/receive sequence numbers.
//!
//! Both counters are 15-bit and wrap from 32767 to 0.

/// Sequence number space (2^15).
pub const SEQ_MODULUS: u16 = 32768;

/// Add `n` to a sequence number modulo 32768.
#[inline]
pub const fn seq_add(seq: u16, n: u16) -> u16 {
    ((seq as u32 + n as u32) % SEQ_MODULUS as u32) as u16
}

/// Sequence state for one connection.
///
/// `recv` is the next I-frame number expected from the remote station and is
/// what every S-frame acknowledges. `send` is stamped on every I-frame this
/// client originates and stays at its initial value for the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    send: u16,
    recv: u16,
}

impl SequenceCounter {
    /// Counters start at zero for every new connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current send sequence number.
    #[inline]
    pub fn send(&self) -> u16 {
        self.send
    }

    /// Current receive sequence number.
    #[inline]
    pub fn recv(&self) -> u16 {
        self.recv
    }

    /// Count one received I-frame and return the new receive number.
    #[inline]
    pub fn advance_recv(&mut self) -> u16 {
        self.recv = seq_add(self.recv, 1);
        self.recv
    }
}
