//! This module contains utilities that are useful for testing code based on BUS sockets. They
//!  are used for testing the crate itself, but they are also exported for application testing:
//!  an in-process multicast engine, and helpers for creating sockets with well-known node ids.

pub mod fanout;
pub mod node;
