use std::{io, thread, time::Duration};

use log::debug;
use nfq::{Message, Queue};

use crate::{
    backend::{Backend, Iptables, PacketQueue, RedirectRule, Verdict},
    config::QueueOptions,
    error::{FirewallError, QueueError},
};

// 非阻塞 socket 上没有包时的等待，远小于 RECV_POLL_INTERVAL
const IDLE_WAIT: Duration = Duration::from_millis(5);

// ==========================================
// nfq::Message 包装：对外只暴露负载字节
// ==========================================
pub struct NfqPacket(Message);

impl AsRef<[u8]> for NfqPacket {
    fn as_ref(&self) -> &[u8] {
        self.0.get_payload()
    }
}

impl From<Message> for NfqPacket {
    fn from(value: Message) -> Self {
        Self(value)
    }
}

impl From<NfqPacket> for Message {
    fn from(value: NfqPacket) -> Self {
        value.0
    }
}

fn make_queue(queue_num: u16, options: &QueueOptions) -> Result<Queue, io::Error> {
    let mut q = Queue::open()?;
    q.bind(queue_num)?;
    q.set_copy_range(queue_num, options.copy_range)?;
    q.set_queue_max_len(queue_num, options.max_len)?;
    q.set_nonblocking(true);
    Ok(q)
}

pub struct NfqSubscription {
    queue: Queue,
    queue_num: u16,
}

impl PacketQueue for NfqSubscription {
    type Packet = NfqPacket;

    fn recv(&mut self) -> Result<Option<NfqPacket>, QueueError> {
        match self.queue.recv() {
            Ok(msg) => Ok(Some(NfqPacket::from(msg))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(IDLE_WAIT);
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(QueueError::Recv(e)),
        }
    }

    fn verdict(&mut self, packet: NfqPacket, verdict: Verdict) -> Result<(), QueueError> {
        let mut msg: Message = packet.into();
        if let Verdict::AcceptModified(bytes) = verdict {
            msg.set_payload(bytes);
        }
        msg.set_verdict(nfq::Verdict::Accept);
        self.queue.verdict(msg).map_err(QueueError::Verdict)
    }
}

impl Drop for NfqSubscription {
    fn drop(&mut self) {
        if let Err(e) = self.queue.unbind(self.queue_num) {
            debug!("queue {} unbind: {}", self.queue_num, e);
        }
    }
}

/// NFQUEUE subscriptions plus iptables redirect rules.
#[derive(Debug, Default)]
pub struct NfqBackend {
    firewall: Iptables,
}

impl NfqBackend {
    pub fn new(firewall: Iptables) -> Self {
        Self { firewall }
    }
}

impl Backend for NfqBackend {
    type Queue = NfqSubscription;

    fn probe(&self) -> Result<(), FirewallError> {
        self.firewall.probe()
    }

    fn subscribe(&self, queue_num: u16, options: &QueueOptions) -> Result<NfqSubscription, QueueError> {
        let queue = make_queue(queue_num, options).map_err(|source| QueueError::Open { queue_num, source })?;
        Ok(NfqSubscription { queue, queue_num })
    }

    fn install_rule(&self, rule: &RedirectRule) -> Result<(), FirewallError> {
        self.firewall.append_unique(rule)
    }

    fn remove_rule(&self, rule: &RedirectRule) -> Result<(), FirewallError> {
        self.firewall.delete(rule)
    }
}
