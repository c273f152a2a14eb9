//! Service block transfers in progress
//!
//! Only one transfer runs at a time: a large response sent block by block,
//! a large SET value or ACTION parameter received block by block, or a
//! general block transfer waiting for acknowledgements.

use crate::hooks::ServerHooks;
use crate::server::DlmsServer;
use dlms_application::framing;
use dlms_application::gbt::{self, GbtBlock};
use dlms_application::service::{
    ActionResponse, CosemAttributeDescriptor, CosemMethodDescriptor, DataBlock, GetResponse, ReadResponse,
    ReadResult, SelectiveAccessDescriptor,
};
use dlms_application::Command;
use dlms_core::{DataAccessResult, DlmsError, DlmsResult};
use log::debug;

/// Extra bytes a variable-length count may need over a one byte count.
const MAX_COUNT_GROWTH: usize = 4;

#[derive(Debug, Default)]
pub(crate) enum Transfer {
    #[default]
    None,
    Outbound(OutboundBlocks),
    Inbound(InboundBlocks),
    /// Blocks of a response sent with general block transfer.
    Gbt(Vec<GbtBlock>),
}

/// Encoded value sent to the client in data blocks.
#[derive(Debug)]
pub(crate) struct OutboundBlocks {
    /// GetResponse, MethodResponse or ReadResponse.
    pub command: Command,
    pub invoke_id: u8,
    raw: Vec<u8>,
    position: usize,
    chunk: usize,
    /// Last block number sent.
    pub block_number: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum InboundTarget {
    Set {
        descriptor: CosemAttributeDescriptor,
        access: Option<SelectiveAccessDescriptor>,
    },
    Action(CosemMethodDescriptor),
}

/// Encoded value received from the client in data blocks.
#[derive(Debug)]
pub(crate) struct InboundBlocks {
    pub target: InboundTarget,
    pub raw: Vec<u8>,
    /// Last block number received.
    pub block_number: u32,
}

impl InboundBlocks {
    /// Add block `block` if it is the next one; false otherwise.
    pub fn append(&mut self, block: &DataBlock) -> bool {
        if block.block_number != self.block_number + 1 {
            return false;
        }
        self.raw.extend_from_slice(&block.raw_data);
        self.block_number = block.block_number;
        true
    }
}

impl<H: ServerHooks> DlmsServer<H> {
    /// Send `raw` in data blocks of `command`, starting with block 1.
    pub(crate) fn start_blocks(&mut self, command: Command, invoke_id: u8, raw: Vec<u8>) -> DlmsResult<Vec<Vec<u8>>> {
        let header = self.block_apdu(command, invoke_id, false, 1, Vec::new())?.len();
        let chunk = self
            .max_reply_size()
            .saturating_sub(header + MAX_COUNT_GROWTH + framing::cipher_overhead(&self.settings));
        if chunk == 0 {
            return Err(DlmsError::InvalidParameter(format!(
                "PDU size {} leaves no room for block data",
                self.max_reply_size()
            )));
        }
        debug!(
            "Sending {} bytes in blocks of {} ({:?})",
            raw.len(),
            chunk,
            command
        );
        self.transfer = Transfer::Outbound(OutboundBlocks {
            command,
            invoke_id,
            raw,
            position: 0,
            chunk,
            block_number: 0,
        });
        self.send_next_block()
    }

    /// Answer a request for the block after `block_number`.
    ///
    /// `None` when no matching transfer is in progress.
    pub(crate) fn continue_blocks(&mut self, command: Command, block_number: u32) -> Option<DlmsResult<Vec<Vec<u8>>>> {
        match &self.transfer {
            Transfer::Outbound(blocks) if blocks.command == command && blocks.block_number == block_number => {
                Some(self.send_next_block())
            }
            _ => {
                self.transfer = Transfer::None;
                None
            }
        }
    }

    fn send_next_block(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        let Transfer::Outbound(blocks) = &mut self.transfer else {
            return Err(DlmsError::InvalidParameter("No block transfer in progress".to_string()));
        };
        let end = (blocks.position + blocks.chunk).min(blocks.raw.len());
        let data = blocks.raw[blocks.position..end].to_vec();
        blocks.position = end;
        blocks.block_number += 1;
        let last = end == blocks.raw.len();
        let (command, invoke_id, block_number) = (blocks.command, blocks.invoke_id, blocks.block_number);
        if last {
            self.transfer = Transfer::None;
        }
        Ok(vec![self.block_apdu(command, invoke_id, last, block_number, data)?])
    }

    fn block_apdu(
        &self,
        command: Command,
        invoke_id: u8,
        last_block: bool,
        block_number: u32,
        raw: Vec<u8>,
    ) -> DlmsResult<Vec<u8>> {
        let utc2 = self.settings.use_utc2_normal_time;
        match command {
            Command::GetResponse => GetResponse::WithDataBlock {
                invoke_id,
                last_block,
                block_number,
                result: Ok(raw),
            }
            .encode(utc2),
            Command::MethodResponse => ActionResponse::WithPblock {
                invoke_id,
                block: DataBlock::new(last_block, block_number, raw),
            }
            .encode(utc2),
            Command::ReadResponse => {
                let block_number = u16::try_from(block_number)
                    .map_err(|_| DlmsError::InvalidParameter(format!("Block number {} out of range", block_number)))?;
                ReadResponse::new(vec![ReadResult::DataBlockResult {
                    last_block,
                    block_number,
                    raw_data: raw,
                }])
                .encode(utc2)
            }
            other => Err(DlmsError::InvalidParameter(format!("{:?} has no data blocks", other))),
        }
    }

    /// Send a response with general block transfer, one window at a time.
    pub(crate) fn start_gbt(&mut self, apdu: Vec<u8>) -> DlmsResult<Vec<Vec<u8>>> {
        let ciphered = framing::cipher_apdu(&mut self.settings, apdu)?;
        let window = self.settings.gbt_window_size.max(1);
        let blocks = gbt::split(&ciphered, self.max_reply_size(), window)?;
        debug!(
            "Sending {} bytes in {} general blocks, window {}",
            ciphered.len(),
            blocks.len(),
            window
        );
        let first = gbt::next_window(&blocks, 0, window);
        self.transfer = if first.iter().any(|block| block.last_block) {
            Transfer::None
        } else {
            Transfer::Gbt(blocks)
        };
        Ok(first.iter().map(GbtBlock::encode).collect())
    }

    /// The data-access-result that aborts a block transfer.
    pub(crate) fn abort_result(&self, in_progress: DataAccessResult) -> DataAccessResult {
        if matches!(self.transfer, Transfer::None) {
            in_progress
        } else {
            DataAccessResult::DataBlockNumberInvalid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::ObisCode;

    #[test]
    fn test_inbound_blocks_in_order() {
        let mut blocks = InboundBlocks {
            target: InboundTarget::Action(CosemMethodDescriptor::new(9, ObisCode::new(0, 0, 10, 0, 0, 255), 1)),
            raw: vec![1, 2],
            block_number: 1,
        };
        assert!(!blocks.append(&DataBlock::new(false, 3, vec![9])));
        assert!(blocks.append(&DataBlock::new(true, 2, vec![3])));
        assert_eq!(blocks.raw, vec![1, 2, 3]);
        assert_eq!(blocks.block_number, 2);
    }
}
