//! Transmit half of the emulated radio.

use std::net::SocketAddrV6;

use anyhow::{Context, Result};
use bluem_services::RadioAdapter;
use socket2::{Domain, Protocol, Socket, Type};

use super::{frame, MULTICAST_ADDR};

pub struct UdpRadio {
    socket: Socket,
    dest: SocketAddrV6,
    device_name: Option<String>,
}

impl UdpRadio {
    pub fn new(interface_index: u32, port: u16, device_name: Option<String>) -> Result<Self> {
        let socket = make_multicast_socket(interface_index)
            .context("failed to create multicast advertise socket")?;
        Ok(Self {
            socket,
            dest: SocketAddrV6::new(MULTICAST_ADDR, port, 0, interface_index),
            device_name,
        })
    }
}

impl RadioAdapter for UdpRadio {
    fn transmit(&self, manufacturer_id: u16, payload: &[u8]) -> Result<()> {
        let datagram = frame::build(manufacturer_id, self.device_name.as_deref(), payload)?;
        let sent = self
            .socket
            .send_to(&datagram, &self.dest.into())
            .context("send_to")?;
        tracing::trace!(bytes = sent, dest = %self.dest, "frame sent");
        Ok(())
    }
}

/// Create a UDP socket suitable for sending IPv6 multicast.
fn make_multicast_socket(interface_index: u32) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_multicast_if_v6(interface_index).context("IPV6_MULTICAST_IF")?;
    // Hop limit 1: stay on this link, like radio range.
    socket.set_multicast_hops_v6(1).context("IPV6_MULTICAST_HOPS")?;

    Ok(socket)
}
