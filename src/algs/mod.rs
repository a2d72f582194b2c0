//! Message-passing plumbing for the distributed graph layer.

pub mod collective;
pub mod communicator;
pub mod size_exchange;
pub mod wire;

pub use communicator::{wait_any, CommTag, Communicator, NoComm, ThreadComm};
