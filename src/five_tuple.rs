use std::{fmt, net::Ipv4Addr};

use crate::packet::TcpSegment;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: u8,
    pub src_port: u16,
    pub dst_port: u16,
}

impl From<&TcpSegment<'_>> for FiveTuple {
    fn from(seg: &TcpSegment<'_>) -> Self {
        let ip = seg.ip();
        let tcp = seg.tcp();
        FiveTuple {
            src: Ipv4Addr::from(ip.source),
            dst: Ipv4Addr::from(ip.destination),
            proto: ip.protocol.0,
            src_port: tcp.source_port,
            dst_port: tcp.destination_port,
        }
    }
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} proto={}",
            self.src, self.src_port, self.dst, self.dst_port, self.proto
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::decode;
    use etherparse::PacketBuilder;

    #[test]
    fn built_from_decoded_segment() {
        let builder = PacketBuilder::ipv4([10, 1, 2, 3], [172, 16, 0, 9], 64)
            .tcp(443, 50123, 1, 1024)
            .ack(1);
        let mut bytes = Vec::new();
        builder.write(&mut bytes, &[]).unwrap();

        let t = FiveTuple::from(&decode(&bytes).unwrap());
        assert_eq!(t.src, Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(t.dst_port, 50123);
        assert_eq!(t.proto, 6);
        assert_eq!(t.to_string(), "10.1.2.3:443 -> 172.16.0.9:50123 proto=6");
    }
}
