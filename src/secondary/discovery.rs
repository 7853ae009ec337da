//! UDP broadcast discovery for IP-Uptane secondaries (spec section 4.6).
//! A small JSON request is broadcast; replies are collected until the
//! timeout expires. Grounded on the client's own `atomic::Multicast`
//! socket setup, narrowed to a single broadcast/collect round trip.

use net2::UdpBuilder;
use net2::unix::UnixUdpBuilderExt;
use serde_json as json;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use datatype::{EcuSerial, Error, HardwareIdentifier};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiscoveryRequest {
    pub local_port: u16,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiscoveryResponse {
    pub ecu_serial:   EcuSerial,
    pub hardware_id:  HardwareIdentifier,
    pub port:         u16,
}

/// Broadcast a discovery request on `broadcast_addr` and collect replies
/// for `timeout`. Each reply is independent; a malformed one is skipped.
pub fn discover(broadcast_addr: SocketAddrV4, local_port: u16, timeout: Duration) -> Result<Vec<DiscoveryResponse>, Error> {
    let socket = UdpBuilder::new_v4()?
        .reuse_address(true)?
        .reuse_port(true)?
        .bind((Ipv4Addr::new(0, 0, 0, 0), 0))?;
    socket.set_broadcast(true)?;
    socket.set_read_timeout(Some(Duration::from_millis(250)))?;

    let request = json::to_vec(&DiscoveryRequest { local_port: local_port })?;
    socket.send_to(&request, SocketAddr::V4(broadcast_addr))?;

    let mut replies = Vec::new();
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 1024];
    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => {
                if let Ok(resp) = json::from_slice::<DiscoveryResponse>(&buf[..len]) {
                    replies.push(resp);
                }
            }
            Err(ref err) if err.kind() == ::std::io::ErrorKind::WouldBlock
                         || err.kind() == ::std::io::ErrorKind::TimedOut => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(replies)
}
