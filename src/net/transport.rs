//! Command Socket Setup
//!
//! Binds the per-process UDP command socket by scanning the configured port
//! range in ascending order. Exhausting the range is fatal: nothing in the
//! wrapper can proceed without a bound socket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{bail, Context as _, Result};
use tokio::net::UdpSocket;

use crate::config::PortRange;

/// Binds a UDP socket on the first free port in `[low, high)`.
///
/// Returns the socket together with the port it bound to.
pub async fn bind_in_range(range: PortRange) -> Result<(UdpSocket, u16)> {
    for port in range.low..range.high {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        match UdpSocket::bind(addr).await {
            Ok(socket) => {
                tracing::debug!("bound command socket to port {}", port);
                return Ok((socket, port));
            }
            Err(_) => continue,
        }
    }
    bail!(
        "unable to bind a UDP port in range [{}, {})",
        range.low,
        range.high
    );
}

/// Best-effort discovery of this host's outward-facing IP address.
///
/// Opens a throwaway datagram socket "connected" to a public address; no
/// packet is sent, the kernel just picks the source address a send would
/// use. Falls back to the loopback address when the host has no route.
pub async fn local_ip() -> IpAddr {
    match probe_local_ip().await {
        Ok(ip) => ip,
        Err(err) => {
            tracing::warn!("unable to discover local IP ({err}), assuming loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn probe_local_ip() -> Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("probe socket bind")?;
    socket
        .connect("8.8.8.8:80")
        .await
        .context("probe socket connect")?;
    Ok(socket.local_addr().context("probe local addr")?.ip())
}
