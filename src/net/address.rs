//! Local address discovery.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// First non-loopback IPv4 address of this machine, or 127.0.0.1.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel which
/// local address would route outward.
pub fn first_external_ipv4() -> Ipv4Addr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(IpAddr::V4(ip)) if !ip.is_loopback() && !ip.is_unspecified() => ip,
        _ => Ipv4Addr::LOCALHOST,
    }
}
