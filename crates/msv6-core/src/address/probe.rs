//! Host-level IPv6 reachability check.

use std::net::{Ipv6Addr, SocketAddrV6, UdpSocket};

/// Whether the host has a route to the global IPv6 internet.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel for a route.
pub fn ipv6_route_available() -> bool {
    let target = SocketAddrV6::new(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888), 53, 0, 0);
    let Ok(socket) = UdpSocket::bind("[::]:0") else {
        return false;
    };
    match socket.connect(target) {
        Ok(()) => socket
            .local_addr()
            .map(|addr| !addr.ip().is_unspecified() && !addr.ip().is_loopback())
            .unwrap_or(false),
        Err(e) => {
            tracing::debug!(error = %e, "no IPv6 route");
            false
        }
    }
}
