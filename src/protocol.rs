//! Controlling-station reaction rules.
//!
//! [`Protocol`] turns each received APDU into an ordered list of [`Action`]s.
//! It owns the connection's sequence numbers, so it is also the only place
//! outgoing numbered frames are built. It performs no I/O.

use tracing::{debug, info, warn};

use crate::codec::Apdu;
use crate::sequence::SequenceCounter;
use crate::types::{Apci, Asdu, Cot, TypeId, UFunction, QCC_GENERAL_READ, QOI_STATION};

/// Something the session must do in response to a frame, in list order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Hand the frame to the application.
    Deliver(Apdu),
    /// Queue the frame for the socket.
    Send(Apdu),
}

/// Frame dispatcher for one connection.
#[derive(Debug, Clone)]
pub struct Protocol {
    seq: SequenceCounter,
    common_address: u16,
    i_frames_received: u64,
}

impl Protocol {
    /// Create a dispatcher addressing the given station.
    pub fn new(common_address: u16) -> Self {
        Self {
            seq: SequenceCounter::new(),
            common_address,
            i_frames_received: 0,
        }
    }

    /// Current sequence numbers.
    pub fn sequence(&self) -> SequenceCounter {
        self.seq
    }

    /// Number of I-frames forwarded to the application so far.
    pub fn i_frames_received(&self) -> u64 {
        self.i_frames_received
    }

    /// STARTDT act, sent right after the TCP connection is up.
    pub fn start_data_transfer(&self) -> Apdu {
        Apdu::u_frame(UFunction::StartDtAct)
    }

    /// Station interrogation (total call).
    pub fn general_interrogation(&self) -> Apdu {
        let asdu = Asdu::interrogation_command(self.common_address, QOI_STATION);
        self.numbered(asdu)
    }

    /// Counter interrogation (electricity total call).
    pub fn counter_interrogation(&self) -> Apdu {
        let asdu = Asdu::counter_interrogation_command(self.common_address, QCC_GENERAL_READ);
        self.numbered(asdu)
    }

    fn numbered(&self, asdu: Asdu) -> Apdu {
        Apdu::i_frame(self.seq.send(), self.seq.recv(), asdu)
    }

    fn acknowledge(&mut self) -> Apdu {
        Apdu::s_frame(self.seq.advance_recv())
    }

    /// Decide the reaction to a received frame.
    pub fn handle(&mut self, apdu: Apdu) -> Vec<Action> {
        match apdu.apci {
            Apci::IFrame { .. } => self.handle_i_frame(apdu),
            Apci::SFrame { recv_seq } => {
                debug!(recv_seq, "received S-frame");
                vec![Action::Deliver(apdu)]
            }
            Apci::UFrame { function } => self.handle_u_frame(function),
        }
    }

    fn handle_i_frame(&mut self, apdu: Apdu) -> Vec<Action> {
        let kind = apdu
            .asdu
            .as_ref()
            .map(|asdu| (asdu.type_id(), asdu.cot(), asdu.header.negative));

        match kind {
            Some((TypeId::InterrogationCommand, Cot::ActivationConfirm, negative)) => {
                if negative {
                    warn!("station rejected interrogation");
                } else {
                    info!("interrogation confirmed");
                }
                vec![Action::Send(self.acknowledge())]
            }
            Some((TypeId::InterrogationCommand, Cot::ActivationTermination, _)) => {
                info!("interrogation terminated, requesting counter interrogation");
                let ack = self.acknowledge();
                vec![Action::Send(ack), Action::Send(self.counter_interrogation())]
            }
            Some((TypeId::CounterInterrogation, cot, _)) => {
                info!(%cot, "counter interrogation progress");
                vec![Action::Send(self.acknowledge())]
            }
            _ => {
                self.i_frames_received += 1;
                debug!(count = self.i_frames_received, frame = %apdu, "received I-frame");
                let ack = self.acknowledge();
                vec![Action::Deliver(apdu), Action::Send(ack)]
            }
        }
    }

    fn handle_u_frame(&mut self, function: UFunction) -> Vec<Action> {
        match function {
            UFunction::StartDtCon => {
                info!("data transfer started, sending interrogation");
                vec![Action::Send(self.general_interrogation())]
            }
            UFunction::TestFrAct => {
                debug!("test frame received, confirming");
                vec![Action::Send(Apdu::u_frame(UFunction::TestFrCon))]
            }
            UFunction::Unknown(code) => {
                warn!(code, "ignoring unknown U-frame");
                Vec::new()
            }
            other => {
                debug!(function = other.name(), "ignoring U-frame");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AsduHeader;

    fn i_frame(type_id: TypeId, cot: Cot) -> Apdu {
        Apdu::i_frame(0, 0, Asdu::new(AsduHeader::new(type_id, 1, cot, 1)))
    }

    fn sent(actions: &[Action]) -> Vec<Apdu> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(apdu) => Some(apdu.clone()),
                Action::Deliver(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_interrogation_confirm_acks_only() {
        let mut protocol = Protocol::new(1);
        let actions = protocol.handle(i_frame(TypeId::InterrogationCommand, Cot::ActivationConfirm));
        assert_eq!(actions, vec![Action::Send(Apdu::s_frame(1))]);
        assert_eq!(protocol.i_frames_received(), 0);
    }

    #[test]
    fn test_interrogation_termination_chains_counter_call() {
        let mut protocol = Protocol::new(1);
        let actions =
            protocol.handle(i_frame(TypeId::InterrogationCommand, Cot::ActivationTermination));

        assert_eq!(
            actions,
            vec![
                Action::Send(Apdu::s_frame(1)),
                Action::Send(Apdu::i_frame(
                    0,
                    1,
                    Asdu::counter_interrogation_command(1, QCC_GENERAL_READ)
                )),
            ]
        );
    }

    #[test]
    fn test_counter_interrogation_progress_acks_only() {
        let mut protocol = Protocol::new(1);
        for cot in [Cot::ActivationConfirm, Cot::ActivationTermination] {
            let actions = protocol.handle(i_frame(TypeId::CounterInterrogation, cot));
            assert_eq!(actions.len(), 1);
            assert!(matches!(&actions[0], Action::Send(apdu) if apdu.is_s_frame()));
        }
        assert_eq!(protocol.sequence().recv(), 2);
    }

    #[test]
    fn test_counter_interrogation_any_cause_not_delivered() {
        let mut protocol = Protocol::new(1);
        let actions = protocol.handle(i_frame(TypeId::CounterInterrogation, Cot::UnknownCot));
        assert_eq!(actions, vec![Action::Send(Apdu::s_frame(1))]);
        assert_eq!(protocol.i_frames_received(), 0);
    }

    #[test]
    fn test_data_frame_delivered_then_acked() {
        let mut protocol = Protocol::new(1);
        let frame = i_frame(TypeId::MeasuredFloat, Cot::Spontaneous);
        let actions = protocol.handle(frame.clone());

        assert_eq!(
            actions,
            vec![Action::Deliver(frame), Action::Send(Apdu::s_frame(1))]
        );
        assert_eq!(protocol.i_frames_received(), 1);
    }

    #[test]
    fn test_interrogation_with_other_cause_is_data() {
        let mut protocol = Protocol::new(1);
        let actions = protocol.handle(i_frame(TypeId::InterrogationCommand, Cot::UnknownCot));
        assert!(matches!(actions[0], Action::Deliver(_)));
        assert_eq!(sent(&actions), vec![Apdu::s_frame(1)]);
    }

    #[test]
    fn test_every_i_frame_acked_once_with_increasing_rsn() {
        let mut protocol = Protocol::new(1);
        let frames = [
            i_frame(TypeId::InterrogationCommand, Cot::ActivationConfirm),
            i_frame(TypeId::SinglePoint, Cot::InterrogatedByStation),
            i_frame(TypeId::MeasuredFloat, Cot::InterrogatedByStation),
            i_frame(TypeId::InterrogationCommand, Cot::ActivationTermination),
            i_frame(TypeId::CounterInterrogation, Cot::ActivationConfirm),
            i_frame(TypeId::IntegratedTotals, Cot::RequestedByGeneralCounter),
            i_frame(TypeId::CounterInterrogation, Cot::ActivationTermination),
        ];

        let mut expected_rsn = 0u16;
        for frame in frames {
            let acks: Vec<u16> = sent(&protocol.handle(frame))
                .iter()
                .filter(|apdu| apdu.is_s_frame())
                .filter_map(|apdu| apdu.apci.recv_seq())
                .collect();
            expected_rsn += 1;
            assert_eq!(acks, vec![expected_rsn]);
        }
    }

    #[test]
    fn test_s_frame_is_delivered() {
        let mut protocol = Protocol::new(1);
        let actions = protocol.handle(Apdu::s_frame(4));
        assert_eq!(actions, vec![Action::Deliver(Apdu::s_frame(4))]);
        assert_eq!(protocol.sequence().recv(), 0);
    }

    #[test]
    fn test_start_confirm_sends_interrogation() {
        let mut protocol = Protocol::new(1);
        let actions = protocol.handle(Apdu::u_frame(UFunction::StartDtCon));
        let frames = sent(&actions);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].to_bytes().unwrap(),
            [
                0x68, 0x0E, 0x00, 0x00, 0x00, 0x00, 0x64, 0x01, 0x06, 0x00, 0x01, 0x00, 0x00,
                0x00, 0x00, 0x14
            ]
        );
    }

    #[test]
    fn test_test_frame_confirmed_without_side_effects() {
        let mut protocol = Protocol::new(1);
        let before = protocol.sequence();
        let actions = protocol.handle(Apdu::u_frame(UFunction::TestFrAct));
        assert_eq!(
            actions,
            vec![Action::Send(Apdu::u_frame(UFunction::TestFrCon))]
        );
        assert_eq!(protocol.sequence(), before);
    }

    #[test]
    fn test_other_u_frames_ignored() {
        let mut protocol = Protocol::new(1);
        for function in [
            UFunction::StartDtAct,
            UFunction::StopDtAct,
            UFunction::StopDtCon,
            UFunction::TestFrCon,
            UFunction::Unknown(0x03),
        ] {
            assert!(protocol.handle(Apdu::u_frame(function)).is_empty());
        }
    }

    #[test]
    fn test_originated_frames_keep_send_number() {
        let mut protocol = Protocol::new(7);
        let first = protocol.general_interrogation();
        protocol.handle(i_frame(TypeId::MeasuredFloat, Cot::Spontaneous));
        let second = protocol.counter_interrogation();
        let third = protocol.general_interrogation();

        assert_eq!(first.apci.send_seq(), Some(0));
        assert_eq!(second.apci.send_seq(), Some(0));
        assert_eq!(third.apci.send_seq(), Some(0));
        assert_eq!(second.apci.recv_seq(), Some(1));
        assert_eq!(first.asdu.unwrap().header.common_address, 7);
    }
}
