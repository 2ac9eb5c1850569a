//! Wake-on-LAN magic packet construction and transmission.
//!
//! A magic packet is 6 bytes of `0xFF` followed by the target MAC address
//! repeated 16 times, sent as a UDP broadcast (conventionally port 9).

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::PowerError;

/// Magic packet size: 6 sync bytes + 16 MAC repetitions.
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// Parse a MAC address of the form `AA:BB:CC:DD:EE:FF` (or `-` separated).
pub fn parse_mac(interface: &str, mac: &str) -> Result<[u8; 6], PowerError> {
    let invalid = || PowerError::InvalidMac {
        interface: interface.to_string(),
        mac: mac.to_string(),
    };

    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(invalid());
    }

    let mut bytes = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        bytes[i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    Ok(bytes)
}

/// Build the magic packet payload for a MAC address.
pub fn magic_packet(mac: [u8; 6]) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
    for rep in 0..16 {
        packet[6 + rep * 6..6 + (rep + 1) * 6].copy_from_slice(&mac);
    }
    packet
}

/// Send a magic packet for `mac` to `target`.
///
/// Binds an ephemeral UDP socket with broadcast enabled; the send itself
/// is fire-and-forget, so a successful `send_to` is the acknowledgment.
pub async fn send_magic_packet(
    interface: &str,
    mac: &str,
    target: SocketAddr,
) -> Result<(), PowerError> {
    let packet = magic_packet(parse_mac(interface, mac)?);

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| PowerError::Send(e.to_string()))?;
    socket
        .set_broadcast(true)
        .map_err(|e| PowerError::Send(e.to_string()))?;
    socket
        .send_to(&packet, target)
        .await
        .map_err(|e| PowerError::Send(e.to_string()))?;

    debug!(%interface, %mac, %target, "magic packet sent");
    Ok(())
}
