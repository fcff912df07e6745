//! Rank communication
//!
//! This module gives every rank its place in the world and the two
//! collective steps the run needs: the local-best exchange and the closing
//! barrier.
//!
//! # Architecture
//!
//! decaymc uses a fixed set of W ranks with rank 0 as coordinator:
//!
//! - **Communicator**: rank/size context, point-to-point messages, barrier
//! - **LocalComm**: W threads in one process (crossbeam channels)
//! - **TcpComm**: one rank per process, star topology over TCP
//!
//! # Modules
//!
//! - `protocol`: Message definitions and serialization
//! - `comm`: Communicator trait and in-process backend
//! - `tcp`: Multi-process backend

pub mod comm;
pub mod protocol;
pub mod tcp;

// Re-export key types
pub use comm::{Communicator, LocalComm};
pub use protocol::{LocalBestMessage, Message, PROTOCOL_VERSION, RESULT_TAG};
pub use tcp::TcpComm;
