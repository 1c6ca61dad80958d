pub mod bus;
pub mod engine;
pub mod error;
pub mod message;
pub mod node_id;
pub mod options;
pub mod protocol;
pub mod socket;
