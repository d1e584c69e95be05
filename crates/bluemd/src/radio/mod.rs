//! BLE radio emulation over IPv6 link-local multicast.
//!
//! Advertisements are datagrams sent to ff02::1 on the configured port;
//! scanning is a socket joined to that group. Everything nearby on the same
//! link sees every advertisement, much like devices in radio range.

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

use anyhow::{Context, Result};

pub mod frame;
pub mod listener;
pub mod udp;

/// All-nodes link-local multicast group.
pub const MULTICAST_ADDR: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Get the OS interface index for a named network interface.
/// Returns an error if the interface does not exist.
pub fn if_index(name: &str) -> Result<u32> {
    let name_cstr = std::ffi::CString::new(name).context("interface name contains null byte")?;
    let index = unsafe { libc::if_nametoindex(name_cstr.as_ptr()) };
    if index == 0 {
        anyhow::bail!("interface '{}' not found", name);
    }
    Ok(index)
}

/// The address the kernel would send from on this interface.
///
/// Frames from this address are our own advertisements looping back.
pub fn local_link_addr(interface_index: u32, port: u16) -> Result<Ipv6Addr> {
    let probe = std::net::UdpSocket::bind("[::]:0").context("probe bind")?;
    probe
        .connect(SocketAddrV6::new(MULTICAST_ADDR, port, 0, interface_index))
        .context("probe connect")?;
    match probe.local_addr()? {
        SocketAddr::V6(v6) => Ok(*v6.ip()),
        SocketAddr::V4(_) => anyhow::bail!("expected IPv6 local address"),
    }
}
