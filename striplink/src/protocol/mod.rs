//! Wire protocol: markers, line splitting, checksums and the two roles.
//!
//! ```text
//! sender                                receiver
//!   ETX x8  ------------------------------>  (reset to IDLE)
//!   STX     ------------------------------>  IDLE -> RECEIVING
//!   <payload lines> ---------------------->  buffered
//!   ETX     ------------------------------>  RECEIVING -> WAITING
//!           <-------------------- ACK:<crc32 of payload>
//!   ACK x3  ------------------------------>  deliver, WAITING -> IDLE
//!
//!   ENQ     ------------------------------>  IDLE
//!           <-------------- POTERION IOT:{"name": ...}
//! ```
//!
//! Lines are terminated by any run of `\n`/`\r`; the sender writes `\n\r`.

pub mod announce;
pub mod checksum;
pub mod lines;
pub mod marker;
pub mod receiver;
pub mod sender;

// Re-export common types
pub use announce::Capabilities;
pub use checksum::{message_checksum, normalize_and_checksum};
pub use lines::LineSplitter;
pub use marker::Marker;
pub use receiver::{FrameReceiver, ReceiverState, Step};
pub use sender::{Attempt, CancelHandle, FrameSender, SenderConfig};
