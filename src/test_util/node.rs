use crate::messaging::bus::Bus;
use crate::messaging::engine::PipeId;
use crate::messaging::error::SocketError;
use crate::messaging::node_id::NodeId;
use crate::messaging::socket::{Socket, BUS_SOCKET_TYPE};
use crate::test_util::fanout::InProcHub;

/// convenience method for unit test code: create a [NodeId] based on a number, the same number
///  generating the same id and different numbers different ids. Numbers 1 to 15 give
///  readable ids like 0x1111111111111111
pub fn test_node_id_from_number(number: u16) -> NodeId {
    NodeId(u64::from(number).wrapping_mul(0x1111111111111111))
}

/// Creates a BUS socket with a well-known node id on top of a new in-process engine, returning
///  the id through which other sockets can add a pipe to it
pub fn test_bus_socket(hub: &InProcHub, node_id: NodeId) -> (Socket, PipeId) {
    let engine = hub.engine();
    let pipe = engine.id();
    (Socket::with_protocol(&BUS_SOCKET_TYPE, Box::new(Bus::with_node_id(engine, node_id))), pipe)
}

/// Adds pipes between two sockets in both directions
pub fn connect(a: &mut Socket, a_pipe: PipeId, b: &mut Socket, b_pipe: PipeId) -> Result<(), SocketError> {
    a.add_pipe(b_pipe)?;
    b.add_pipe(a_pipe)?;
    Ok(())
}
