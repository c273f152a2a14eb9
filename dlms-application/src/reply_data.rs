//! Accumulator for one logical response
//!
//! A response may arrive as several HDLC segments, service data blocks or
//! GBT blocks. [`ReplyData`] holds the partial state between frames;
//! [`MoreData`] says which kind of continuation is outstanding.

use crate::command::Command;
use crate::gbt;
use crate::service::GetDataResult;
use dlms_asn1::DataInfo;
use dlms_core::datatypes::CosemDateTime;
use dlms_core::{ByteBuffer, DataAccessResult, Variant};
use dlms_security::DecryptInfo;
use std::fmt;
use std::ops::BitOr;

/// Outstanding continuations of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MoreData(u8);

impl MoreData {
    pub const NONE: Self = Self(0);
    /// More HDLC segments of the same PDU follow.
    pub const FRAME: Self = Self(1);
    /// More service data blocks follow.
    pub const BLOCK: Self = Self(2);
    /// More general block transfer blocks follow.
    pub const GBT: Self = Self(4);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MoreData {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for MoreData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [(Self::FRAME, "Frame"), (Self::BLOCK, "Block"), (Self::GBT, "Gbt")] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        if names.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplyData {
    /// Raw bytes of the PDU being assembled; the plain APDU once complete.
    pub data: ByteBuffer,
    /// Value bytes of a block transfer, consumed by the resumable decoder.
    pub payload: ByteBuffer,
    pub data_info: DataInfo,
    pub value: Option<Variant>,
    pub command: Option<Command>,
    /// Response type byte of the last service PDU.
    pub command_type: u8,
    pub more_data: MoreData,
    pub complete: bool,
    /// Control byte of the last HDLC frame.
    pub frame_control: u8,
    /// Last service or GBT block number received.
    pub block_number: u32,
    /// Last GBT block number acknowledged to the peer.
    pub block_number_ack: u16,
    pub gbt_window_size: u8,
    /// Streaming bit of the last GBT block.
    pub streaming: bool,
    /// GBT blocks this side has sent while acknowledging.
    pub gbt_sent: u16,
    /// Invoke id of the last service PDU; the long id of notifications.
    pub invoke_id: u32,
    /// Failure reported by the peer for a single GET/SET/ACTION.
    pub error: Option<DataAccessResult>,
    /// Time stamp of a data notification.
    pub time: Option<CosemDateTime>,
    /// Per-item results of list services.
    pub list: Vec<GetDataResult>,
    /// Header of the ciphered APDU the response arrived in.
    pub decrypt_info: Option<DecryptInfo>,
    pub(crate) gbt_data: ByteBuffer,
}

impl Default for ReplyData {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ReplyData {
    pub fn new(use_utc2_normal_time: bool) -> Self {
        Self {
            data: ByteBuffer::new(),
            payload: ByteBuffer::new(),
            data_info: DataInfo::new(use_utc2_normal_time),
            value: None,
            command: None,
            command_type: 0,
            more_data: MoreData::NONE,
            complete: false,
            frame_control: 0,
            block_number: 0,
            block_number_ack: 0,
            gbt_window_size: 0,
            streaming: false,
            gbt_sent: 0,
            invoke_id: 0,
            error: None,
            time: None,
            list: Vec::new(),
            decrypt_info: None,
            gbt_data: ByteBuffer::new(),
        }
    }

    /// Reset for the next request, keeping the time convention.
    pub fn clear(&mut self) {
        *self = Self::new(self.data_info.use_utc2_normal_time);
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_more_data(&self) -> bool {
        !self.more_data.is_empty()
    }

    /// Elements of the outermost array announced so far.
    pub fn total_count(&self) -> usize {
        self.data_info.total_count()
    }

    /// Elements of the outermost array decoded so far.
    pub fn read_position(&self) -> usize {
        self.data_info.read_position()
    }

    /// The peer streams and the current block is inside the window.
    pub fn is_streaming(&self) -> bool {
        self.streaming
            && gbt::is_admitted(
                self.block_number as u16,
                self.block_number_ack,
                self.gbt_window_size,
            )
    }

    /// The current GBT block must be acknowledged before more arrive.
    pub fn needs_gbt_ack(&self) -> bool {
        gbt::needs_ack(
            self.streaming,
            self.block_number as u16,
            self.block_number_ack,
            self.gbt_window_size,
        )
    }

    /// Feed value bytes of one block to the resumable decoder.
    ///
    /// Returns true once a whole value has been decoded.
    pub fn append_block_data(&mut self, raw: &[u8]) -> dlms_core::DlmsResult<bool> {
        self.payload.set_bytes(raw);
        if self.value.is_none() {
            if let Some(value) = dlms_asn1::get_data(&mut self.payload, &mut self.data_info)? {
                self.value = Some(value);
            }
            self.payload.trim();
        }
        Ok(self.value.is_some())
    }
}
