use etherparse::{IpNumber, Ipv4Header, TcpHeader};

use crate::{
    error::EncodeError,
    packet::{Classification, TcpFlags},
};

// ==========================================
// IPv4 + TCP 解码后的视图
// ==========================================
#[derive(Debug, Clone)]
pub struct TcpSegment<'a> {
    ip: Ipv4Header,
    tcp: TcpHeader,
    payload: &'a [u8],
}

/// Parses an IPv4/TCP packet. Anything else (other protocols, fragments,
/// truncated or inconsistent headers) yields `None` and is passed through.
pub fn decode(bytes: &[u8]) -> Option<TcpSegment<'_>> {
    // 1. IPv4 头（版本号不为 4 时 etherparse 直接报错）
    let (ip, rest) = Ipv4Header::from_slice(bytes).ok()?;

    // 2. 只处理 TCP，且分片包里拿不到完整的 TCP 头
    if ip.protocol != IpNumber::TCP || ip.is_fragmenting_payload() {
        return None;
    }

    // 3. 以 total_len 为准截取 IP 负载，尾部多余字节忽略
    let ip_payload_len = usize::from(ip.total_len).checked_sub(ip.header_len())?;
    if ip_payload_len > rest.len() {
        return None;
    }

    // 4. TCP 头
    let (tcp, payload) = TcpHeader::from_slice(&rest[..ip_payload_len]).ok()?;

    Some(TcpSegment { ip, tcp, payload })
}

impl<'a> TcpSegment<'a> {
    pub fn ip(&self) -> &Ipv4Header {
        &self.ip
    }

    pub fn tcp(&self) -> &TcpHeader {
        &self.tcp
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn source_port(&self) -> u16 {
        self.tcp.source_port
    }

    pub fn window(&self) -> u16 {
        self.tcp.window_size
    }

    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from(&self.tcp)
    }

    pub fn classify(&self) -> Classification {
        self.flags().classify()
    }

    /// Serializes the segment with a new window, fixing lengths and both checksums.
    pub fn reencode(&self, window: u16) -> Result<Vec<u8>, EncodeError> {
        let mut ip = self.ip.clone();
        let mut tcp = self.tcp.clone();
        tcp.window_size = window;

        let segment_len = usize::from(tcp.header_len()) + self.payload.len();
        ip.set_payload_len(segment_len)
            .map_err(|_| EncodeError::TooLarge { len: segment_len })?;
        ip.header_checksum = ip.calc_header_checksum();
        tcp.checksum = tcp
            .calc_checksum_ipv4(&ip, self.payload)
            .map_err(|_| EncodeError::TooLarge { len: segment_len })?;

        let mut out = Vec::with_capacity(ip.header_len() + segment_len);
        out.extend_from_slice(&ip.to_bytes());
        out.extend_from_slice(&tcp.to_bytes());
        out.extend_from_slice(self.payload);
        Ok(out)
    }
}
