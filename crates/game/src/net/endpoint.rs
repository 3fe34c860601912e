use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use super::protocol::MAX_PACKET_SIZE;
use super::stats::{NetworkStats, PacketLossSimulation};

/// Oversized datagrams must be detectable, so the buffer is larger than the limit.
const RECV_BUFFER_SIZE: usize = MAX_PACKET_SIZE * 2;
const MAX_DATAGRAMS_PER_POLL: usize = 256;

/// Sole owner of the UDP socket. Deals in raw datagrams only.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
    recv_buffer: [u8; RECV_BUFFER_SIZE],
    packet_loss: Option<PacketLossSimulation>,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; RECV_BUFFER_SIZE],
            packet_loss: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    pub fn set_packet_loss(&mut self, simulation: Option<PacketLossSimulation>) {
        self.packet_loss = simulation.filter(|sim| sim.enabled);
    }

    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Datagram exceeds MTU",
            ));
        }

        if self.packet_loss.as_ref().is_some_and(|sim| sim.should_drop()) {
            self.stats.packets_lost += 1;
            return Ok(data.len());
        }

        match self.socket.send_to(data, addr) {
            Ok(bytes) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += bytes as u64;
                Ok(bytes)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(e)
            }
        }
    }

    /// Drains every datagram available right now. Errors on individual
    /// datagrams are logged and skipped.
    pub fn poll(&mut self) -> Vec<(Vec<u8>, SocketAddr)> {
        let mut datagrams = Vec::new();

        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    if size > MAX_PACKET_SIZE {
                        log::debug!("Dropping oversized datagram ({} bytes) from {}", size, addr);
                        self.stats.rejected_datagrams += 1;
                        continue;
                    }

                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;

                    datagrams.push((self.recv_buffer[..size].to_vec(), addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    // ICMP unreachable from a departed peer surfaces here on some platforms.
                    log::warn!("Receive error on {}: {}", self.local_addr, e);
                    self.stats.receive_errors += 1;
                }
            }
        }

        datagrams
    }
}

/// Best guess at the LAN address other machines can reach this one on.
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn local_ip() -> IpAddr {
    let route = || -> io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };

    route().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn loopback() -> NetworkEndpoint {
        NetworkEndpoint::bind("127.0.0.1:0").unwrap()
    }

    fn poll_until_some(endpoint: &mut NetworkEndpoint) -> Vec<(Vec<u8>, SocketAddr)> {
        for _ in 0..200 {
            let received = endpoint.poll();
            if !received.is_empty() {
                return received;
            }
            thread::sleep(Duration::from_millis(2));
        }
        Vec::new()
    }

    #[test]
    fn test_poll_is_non_blocking_when_idle() {
        let mut endpoint = loopback();
        assert!(endpoint.poll().is_empty());
    }

    #[test]
    fn test_datagram_round_trip() {
        let mut a = loopback();
        let mut b = loopback();

        a.send_to(b"hello", b.local_addr()).unwrap();
        let received = poll_until_some(&mut b);

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, b"hello");
        assert_eq!(received[0].1, a.local_addr());
        assert_eq!(a.stats().packets_sent, 1);
        assert_eq!(b.stats().packets_received, 1);
    }

    #[test]
    fn test_oversized_send_is_refused() {
        let mut a = loopback();
        let target = a.local_addr();
        let payload = vec![0u8; MAX_PACKET_SIZE + 1];

        let err = a.send_to(&payload, target).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_simulated_loss_swallows_datagrams() {
        let mut a = loopback();
        let mut b = loopback();
        a.set_packet_loss(Some(PacketLossSimulation::new(1.0)));

        for _ in 0..5 {
            a.send_to(b"lost", b.local_addr()).unwrap();
        }
        thread::sleep(Duration::from_millis(20));

        assert!(b.poll().is_empty());
        assert_eq!(a.stats().packets_lost, 5);
        assert_eq!(a.stats().packets_sent, 0);
    }
}
