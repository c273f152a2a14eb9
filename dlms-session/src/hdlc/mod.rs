//! HDLC framing: addresses, check sequences, frames, numbering and link
//! parameters

pub mod address;
pub mod fcs;
pub mod frame;
pub mod parameters;
pub mod sequence;

pub use address::{HdlcAddress, reserved};
pub use fcs::FcsCalc;
pub use frame::{FLAG, FrameType, HdlcFrame, LLC_REQUEST, LLC_RESPONSE, control};
pub use parameters::HdlcParameters;
pub use sequence::FrameSequence;
