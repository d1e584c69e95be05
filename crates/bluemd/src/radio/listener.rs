//! Receive half of the emulated radio: the scanner.
//!
//! Joins the multicast group and turns every frame carrying our
//! manufacturer id into a [`Discovery`] for the scan worker. Frames under
//! other manufacturer ids never reach the tracker.

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

use anyhow::{Context, Result};
use bluem_core::wire::MANUFACTURER_ID;
use bluem_services::{DeviceAddress, Discovery, LinkStatus, ScanReport};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use super::{frame, MULTICAST_ADDR};

pub struct ListenerSettings {
    pub interface_index: u32,
    pub port: u16,
    /// Our own sending address. Frames from it are dropped.
    pub local_addr: Ipv6Addr,
    /// Reported as the signal strength of every frame.
    pub rssi: i16,
}

/// Receive frames and forward matching ones as scan reports.
///
/// Returns when the scan worker goes away. Cancel by dropping the task handle.
pub async fn listener_loop(
    reports: mpsc::Sender<ScanReport>,
    settings: ListenerSettings,
    link: LinkStatus,
) -> Result<()> {
    let socket = make_listener_socket(settings.interface_index, settings.port)
        .context("failed to create multicast listener socket")?;
    let socket = UdpSocket::from_std(socket).context("failed to convert to tokio UdpSocket")?;

    let mut buf = vec![0u8; 1024];

    tracing::info!(port = settings.port, "radio listener starting");
    link.set_scanning(true);

    loop {
        let (len, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "recv_from failed");
                continue;
            }
        };

        let sender = match peer_addr {
            SocketAddr::V6(v6) => *v6.ip(),
            SocketAddr::V4(_) => {
                tracing::warn!("received IPv4 datagram on IPv6 socket, ignoring");
                continue;
            }
        };
        if sender == settings.local_addr {
            tracing::trace!("ignoring own frame");
            continue;
        }

        let Some(discovery) = to_discovery(&buf[..len], sender, settings.rssi) else {
            continue;
        };

        if reports.send(ScanReport::Single(discovery)).await.is_err() {
            tracing::info!("scan worker gone, radio listener stopping");
            link.set_scanning(false);
            return Ok(());
        }
    }
}

/// Parse a datagram and keep it only if it carries our manufacturer id.
fn to_discovery(datagram: &[u8], sender: Ipv6Addr, rssi: i16) -> Option<Discovery> {
    let frame = match frame::parse(datagram) {
        Ok(f) => f,
        Err(e) => {
            tracing::trace!(sender = %sender, error = %e, "malformed frame");
            return None;
        }
    };
    if frame.manufacturer_id != MANUFACTURER_ID {
        tracing::trace!(
            sender = %sender,
            manufacturer_id = frame.manufacturer_id,
            "frame for another manufacturer"
        );
        return None;
    }

    tracing::trace!(sender = %sender, data = hex::encode(frame.data), "frame received");

    Some(Discovery {
        address: DeviceAddress::new(sender.to_string()),
        rssi,
        name: frame.name.map(str::to_string),
        manufacturer_data: Some(frame.data.to_vec()),
    })
}

/// Create a UDP socket joined to the ff02::1 multicast group.
fn make_listener_socket(interface_index: u32, port: u16) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_only_v6(true).context("IPV6_V6ONLY")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;

    socket
        .join_multicast_v6(&MULTICAST_ADDR, interface_index)
        .context("IPV6_JOIN_GROUP")?;

    Ok(socket.into())
}
