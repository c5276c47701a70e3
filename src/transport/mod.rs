#[cfg(test)]
pub mod memory;
pub mod traits;
pub mod udp;

pub use traits::{Datagram, DatagramTransport};
pub use udp::UdpTransport;
