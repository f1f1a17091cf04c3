use std::time::Duration;

use crate::{
    config::QueueOptions,
    error::{FirewallError, QueueError},
    packet::Category,
    port_set::PortSet,
    queue_range::QueueRange,
};

#[cfg(target_os = "linux")]
mod iptables;
#[cfg(target_os = "linux")]
mod nfqueue;
mod unsupported;

#[cfg(target_os = "linux")]
pub use iptables::Iptables;
#[cfg(target_os = "linux")]
pub use nfqueue::{NfqBackend, NfqPacket, NfqSubscription};
pub use unsupported::{UnsupportedBackend, UnsupportedQueue};

/// Backend picked for the build target.
#[cfg(target_os = "linux")]
pub type PlatformBackend = NfqBackend;
#[cfg(not(target_os = "linux"))]
pub type PlatformBackend = UnsupportedBackend;

/// Upper bound on how long a single `recv` may block, so cancellation is
/// noticed promptly.
pub const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ==========================================
// 判决：原样放行 / 改包后放行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    AcceptModified(Vec<u8>),
}

/// One subscription to a numbered kernel queue.
///
/// `verdict` takes the packet by value, so every received packet gets exactly
/// one verdict.
pub trait PacketQueue {
    type Packet: AsRef<[u8]>;

    /// Waits at most [`RECV_POLL_INTERVAL`]; `Ok(None)` when nothing arrived.
    fn recv(&mut self) -> Result<Option<Self::Packet>, QueueError>;

    fn verdict(&mut self, packet: Self::Packet, verdict: Verdict) -> Result<(), QueueError>;
}

/// Platform capability: queue subscription plus firewall redirect rules.
pub trait Backend: Send + Sync + 'static {
    type Queue: PacketQueue;

    /// Checks that the firewall subsystem is reachable at all.
    fn probe(&self) -> Result<(), FirewallError>;

    /// Subscriptions are opened on the worker thread that will own them.
    fn subscribe(&self, queue_num: u16, options: &QueueOptions) -> Result<Self::Queue, QueueError>;

    /// Must be a no-op when an identical rule is already installed.
    fn install_rule(&self, rule: &RedirectRule) -> Result<(), FirewallError>;

    fn remove_rule(&self, rule: &RedirectRule) -> Result<(), FirewallError>;
}

// ==========================================
// 防火墙重定向规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub category: Category,
    pub ports: Vec<u16>,
    pub queues: QueueRange,
    pub bypass: bool,
}

impl RedirectRule {
    /// `-m multiport` takes at most 15 ports per rule.
    pub const MAX_PORTS: usize = 15;

    pub fn for_category(
        category: Category,
        queues: QueueRange,
        ports: &PortSet,
        bypass: bool,
    ) -> Vec<RedirectRule> {
        ports
            .sorted()
            .chunks(Self::MAX_PORTS)
            .map(|chunk| RedirectRule {
                category,
                ports: chunk.to_vec(),
                queues,
                bypass,
            })
            .collect()
    }

    pub fn port_list(&self) -> String {
        self.ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
