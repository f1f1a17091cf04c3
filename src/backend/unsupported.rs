use log::error;

use crate::{
    backend::{Backend, PacketQueue, RedirectRule, Verdict},
    config::QueueOptions,
    error::{FirewallError, QueueError},
};

/// Stand-in for platforms without netfilter queues. Every operation reports
/// "not supported".
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

/// Never constructed.
pub enum UnsupportedQueue {}

impl PacketQueue for UnsupportedQueue {
    type Packet = Vec<u8>;

    fn recv(&mut self) -> Result<Option<Vec<u8>>, QueueError> {
        match *self {}
    }

    fn verdict(&mut self, _packet: Vec<u8>, _verdict: Verdict) -> Result<(), QueueError> {
        match *self {}
    }
}

impl Backend for UnsupportedBackend {
    type Queue = UnsupportedQueue;

    fn probe(&self) -> Result<(), FirewallError> {
        error!("unsupported os: {}", std::env::consts::OS);
        Err(FirewallError::Unsupported)
    }

    fn subscribe(&self, _queue_num: u16, _options: &QueueOptions) -> Result<UnsupportedQueue, QueueError> {
        Err(QueueError::Unsupported)
    }

    fn install_rule(&self, _rule: &RedirectRule) -> Result<(), FirewallError> {
        Err(FirewallError::Unsupported)
    }

    fn remove_rule(&self, _rule: &RedirectRule) -> Result<(), FirewallError> {
        Err(FirewallError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{packet::Category, queue_range::QueueRange};

    #[test]
    fn every_operation_is_unsupported() {
        let backend = UnsupportedBackend;
        let rule = RedirectRule {
            category: Category::PureAck,
            ports: vec![443],
            queues: QueueRange::new(1, 2).unwrap(),
            bypass: false,
        };
        assert!(matches!(backend.probe(), Err(FirewallError::Unsupported)));
        assert!(matches!(
            backend.subscribe(1, &QueueOptions::default()),
            Err(QueueError::Unsupported)
        ));
        assert!(matches!(backend.install_rule(&rule), Err(FirewallError::Unsupported)));
        assert!(matches!(backend.remove_rule(&rule), Err(FirewallError::Unsupported)));
    }
}
