//! Modulo-8 frame numbering of an HDLC connection

use crate::hdlc::frame::FrameType;
use dlms_core::{DlmsError, DlmsResult};
use log::warn;

/// Send counter N(S) and receive counter N(R) of one station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSequence {
    send: u8,
    receive: u8,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both counters back to zero, as after SNRM/UA.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn send_sequence(&self) -> u8 {
        self.send
    }

    pub fn receive_sequence(&self) -> u8 {
        self.receive
    }

    /// Control byte of the next information frame; advances N(S).
    pub fn next_send(&mut self) -> u8 {
        let control = (self.receive << 5) | 0x10 | (self.send << 1);
        self.send = (self.send + 1) & 0x07;
        control
    }

    /// Control byte of a receive-ready frame acknowledging everything so far.
    pub fn receiver_ready(&self) -> u8 {
        (self.receive << 5) | 0x11
    }

    /// Check a received control byte and advance N(R) for information frames.
    pub fn check_frame(&mut self, control: u8) -> DlmsResult<()> {
        let Some(frame_type) = FrameType::from_control_byte(control) else {
            return Err(DlmsError::FrameInvalid(format!("Control field unknown: 0x{:02X}", control)));
        };
        let nr = control >> 5;
        match frame_type {
            FrameType::Information => {
                let ns = (control >> 1) & 0x07;
                if ns != self.receive {
                    warn!("Out of sequence frame N(S)={}, expected {}", ns, self.receive);
                    return Err(DlmsError::FrameInvalid(format!(
                        "Out of sequence frame N(S)={}, expected {}",
                        ns, self.receive
                    )));
                }
                self.check_acknowledge(nr)?;
                self.receive = (self.receive + 1) & 0x07;
            }
            // segments are numbered when the PDU is split, so an RR may
            // acknowledge fewer frames than were numbered
            FrameType::ReceiveReady | FrameType::ReceiveNotReady => {}
            FrameType::SetNormalResponseMode | FrameType::UnnumberedAcknowledge => self.reset(),
            _ => {}
        }
        Ok(())
    }

    fn check_acknowledge(&self, nr: u8) -> DlmsResult<()> {
        if nr != self.send {
            warn!("Unexpected N(R)={}, sent {}", nr, self.send);
            return Err(DlmsError::FrameInvalid(format!(
                "Unexpected N(R)={}, expected {}",
                nr, self.send
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_controls() {
        let mut sequence = FrameSequence::new();
        assert_eq!(sequence.next_send(), 0x10);
        assert_eq!(sequence.next_send(), 0x12);
        assert_eq!(sequence.receiver_ready(), 0x11);
        for _ in 0..6 {
            sequence.next_send();
        }
        assert_eq!(sequence.send_sequence(), 0);
    }

    #[test]
    fn test_receive_wraps_modulo_8() {
        let mut sequence = FrameSequence::new();
        for ns in [0u8, 1, 2, 3, 4, 5, 6, 7, 0, 1] {
            assert!(sequence.check_frame(0x10 | (ns << 1)).is_ok(), "N(S)={}", ns);
        }
        assert_eq!(sequence.receive_sequence(), 2);
        assert_eq!(sequence.receiver_ready(), 0x51);
    }

    #[test]
    fn test_jump_rejected() {
        let mut sequence = FrameSequence::new();
        sequence.check_frame(0x10).unwrap();
        assert!(matches!(sequence.check_frame(0x10 | (3 << 1)), Err(DlmsError::FrameInvalid(_))));
        assert_eq!(sequence.receive_sequence(), 1);
    }

    #[test]
    fn test_acknowledge_checked() {
        let mut sequence = FrameSequence::new();
        sequence.next_send();
        sequence.next_send();
        // information frames must acknowledge everything sent
        assert!(sequence.check_frame(0x30).is_err());
        assert!(sequence.check_frame(0x50).is_ok());
        // receive-ready may lag behind pre-numbered segments
        assert!(sequence.check_frame(0x31).is_ok());
        assert_eq!(sequence.receive_sequence(), 1);
    }

    #[test]
    fn test_ua_resets() {
        let mut sequence = FrameSequence::new();
        sequence.next_send();
        sequence.check_frame(0x73).unwrap();
        assert_eq!(sequence, FrameSequence::new());
    }
}
