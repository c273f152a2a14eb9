//! General block transfer
//!
//! ```text
//! E0 | control | block-number (u16) | block-number-ack (u16) | block-data
//! ```
//!
//! The control byte carries the last-block flag (bit 7), the streaming flag
//! (bit 6) and the window size (bits 0..5). Block data is an octet string.

use crate::command::Command;
use crate::reply_data::{MoreData, ReplyData};
use crate::service::{expect_tag, object_count_size};
use dlms_core::{ByteBuffer, DlmsError, DlmsResult};
use log::{debug, trace};

const LAST_BLOCK: u8 = 0x80;
const STREAMING: u8 = 0x40;
const WINDOW_MASK: u8 = 0x3F;

/// Bytes a block adds around `data_length` bytes of data.
pub fn overhead(data_length: usize) -> usize {
    1 + 1 + 2 + 2 + object_count_size(data_length)
}

/// Block `block_number` may be sent before the next acknowledgement.
pub fn is_admitted(block_number: u16, block_number_ack: u16, window_size: u8) -> bool {
    u32::from(block_number) <= u32::from(block_number_ack) + u32::from(window_size)
}

/// The receiver acknowledges when streaming stops or the window is full.
pub fn needs_ack(streaming: bool, block_number: u16, block_number_ack: u16, window_size: u8) -> bool {
    !streaming || u32::from(block_number) >= u32::from(block_number_ack) + u32::from(window_size)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GbtBlock {
    pub last_block: bool,
    pub streaming: bool,
    pub window_size: u8,
    pub block_number: u16,
    pub block_number_ack: u16,
    pub data: Vec<u8>,
}

impl GbtBlock {
    /// An empty block acknowledging `block_number_ack`.
    pub fn ack(block_number: u16, block_number_ack: u16, window_size: u8) -> Self {
        Self {
            last_block: false,
            streaming: false,
            window_size,
            block_number,
            block_number_ack,
            data: Vec::new(),
        }
    }

    pub fn control(&self) -> u8 {
        let mut control = self.window_size & WINDOW_MASK;
        if self.last_block {
            control |= LAST_BLOCK;
        }
        if self.streaming {
            control |= STREAMING;
        }
        control
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = ByteBuffer::with_capacity(overhead(self.data.len()) + self.data.len());
        buffer.set_u8(Command::GeneralBlockTransfer.value());
        buffer.set_u8(self.control());
        buffer.set_u16(self.block_number);
        buffer.set_u16(self.block_number_ack);
        buffer.set_object_count(self.data.len());
        buffer.set_bytes(&self.data);
        buffer.into_vec()
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::GeneralBlockTransfer.value(), "General-Block-Transfer")?;
        let control = buffer.get_u8()?;
        let block_number = buffer.get_u16()?;
        let block_number_ack = buffer.get_u16()?;
        let length = buffer.get_object_count()?;
        Ok(Self {
            last_block: control & LAST_BLOCK != 0,
            streaming: control & STREAMING != 0,
            window_size: control & WINDOW_MASK,
            block_number,
            block_number_ack,
            data: buffer.get_bytes(length)?,
        })
    }
}

/// Split an APDU into blocks of at most `max_block_size` encoded bytes,
/// numbered from 1.
pub fn split(apdu: &[u8], max_block_size: usize, window_size: u8) -> DlmsResult<Vec<GbtBlock>> {
    let chunk = max_block_size.saturating_sub(overhead(max_block_size));
    if chunk == 0 {
        return Err(DlmsError::InvalidParameter(format!(
            "PDU size {} is too small for general block transfer",
            max_block_size
        )));
    }
    let count = apdu.len().div_ceil(chunk).max(1);
    if count > usize::from(u16::MAX) {
        return Err(DlmsError::InvalidParameter(format!(
            "APDU of {} bytes needs too many blocks",
            apdu.len()
        )));
    }
    let mut blocks = Vec::with_capacity(count);
    for index in 0..count {
        let start = index * chunk;
        let end = (start + chunk).min(apdu.len());
        blocks.push(GbtBlock {
            last_block: index + 1 == count,
            streaming: false,
            window_size,
            block_number: (index + 1) as u16,
            block_number_ack: 0,
            data: apdu[start..end].to_vec(),
        });
    }
    Ok(blocks)
}

/// Blocks to send after the peer acknowledged `block_number_ack`.
///
/// Every block of the window but the last has the streaming bit set.
pub fn next_window(blocks: &[GbtBlock], block_number_ack: u16, window_size: u8) -> Vec<GbtBlock> {
    let window_size = window_size.max(1);
    let mut window: Vec<GbtBlock> = blocks
        .iter()
        .filter(|block| {
            block.block_number > block_number_ack
                && is_admitted(block.block_number, block_number_ack, window_size)
        })
        .cloned()
        .collect();
    let count = window.len();
    for (index, block) in window.iter_mut().enumerate() {
        block.streaming = index + 1 < count;
        block.window_size = window_size;
    }
    window
}

/// Add a received block to `reply`.
///
/// Returns the reassembled APDU when the last block arrived.
pub fn receive(reply: &mut ReplyData, block: GbtBlock) -> DlmsResult<Option<Vec<u8>>> {
    let expected = (reply.block_number as u16).wrapping_add(1);
    if !reply.more_data.contains(MoreData::GBT) {
        reply.gbt_data.clear();
        reply.block_number_ack = 0;
        reply.block_number = 0;
        if block.block_number != 1 {
            return Err(DlmsError::InvalidResponse(format!(
                "General block transfer starts with block {}",
                block.block_number
            )));
        }
    } else if block.block_number != expected {
        return Err(DlmsError::InvalidResponse(format!(
            "General block {} received, expected {}",
            block.block_number, expected
        )));
    }
    trace!(
        "GBT block {} ack {} window {}{}",
        block.block_number,
        block.block_number_ack,
        block.window_size,
        if block.last_block { " last" } else { "" }
    );
    reply.block_number = u32::from(block.block_number);
    reply.streaming = block.streaming;
    reply.gbt_window_size = block.window_size;
    reply.gbt_data.set_bytes(&block.data);
    if block.last_block {
        reply.more_data.remove(MoreData::GBT);
        let apdu = reply.gbt_data.as_slice().to_vec();
        reply.gbt_data.clear();
        debug!("General block transfer complete, {} bytes", apdu.len());
        return Ok(Some(apdu));
    }
    reply.more_data.insert(MoreData::GBT);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_admission() {
        assert!(is_admitted(1, 0, 3));
        assert!(is_admitted(2, 0, 3));
        assert!(is_admitted(3, 0, 3));
        assert!(!is_admitted(4, 0, 3));
        assert!(is_admitted(4, 1, 3));
    }

    #[test]
    fn test_block_layout() {
        let block = GbtBlock {
            last_block: true,
            streaming: false,
            window_size: 1,
            block_number: 2,
            block_number_ack: 1,
            data: vec![0xC4, 0x01],
        };
        let encoded = block.encode();
        assert_eq!(encoded, vec![0xE0, 0x81, 0x00, 0x02, 0x00, 0x01, 0x02, 0xC4, 0x01]);
        assert_eq!(GbtBlock::decode(&encoded).unwrap(), block);
    }

    #[test]
    fn test_split_and_window() {
        let apdu: Vec<u8> = (0..50).collect();
        let blocks = split(&apdu, 20, 3).unwrap();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|block| block.encode().len() <= 20));
        assert!(blocks[3].last_block);

        let window = next_window(&blocks, 0, 3);
        let numbers: Vec<u16> = window.iter().map(|block| block.block_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(window[0].streaming && window[1].streaming && !window[2].streaming);
        assert_eq!(next_window(&blocks, 3, 3).len(), 1);
        assert!(split(&apdu, 6, 1).is_err());
    }

    #[test]
    fn test_receive_reassembles() {
        let apdu: Vec<u8> = (0..50).collect();
        let blocks = split(&apdu, 20, 2).unwrap();
        let mut reply = ReplyData::new(false);
        for block in &blocks[..3] {
            assert_eq!(receive(&mut reply, block.clone()).unwrap(), None);
            assert!(reply.more_data.contains(MoreData::GBT));
        }
        assert_eq!(receive(&mut reply, blocks[3].clone()).unwrap(), Some(apdu));
        assert!(reply.more_data.is_empty());
    }

    #[test]
    fn test_receive_rejects_gap() {
        let blocks = split(&[0u8; 50], 20, 2).unwrap();
        let mut reply = ReplyData::new(false);
        receive(&mut reply, blocks[0].clone()).unwrap();
        assert!(matches!(
            receive(&mut reply, blocks[2].clone()),
            Err(DlmsError::InvalidResponse(_))
        ));
    }
}
