use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{debug, error, trace, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    backend::{Backend, PacketQueue, Verdict},
    config::QueueOptions,
    error::EncodeError,
    five_tuple::FiveTuple,
    packet::{self, Category, TcpSegment},
    packet_context::PacketContext,
    policy::WindowPolicy,
    port_set::PortSet,
};

/// Global cancellation: set once on shutdown, polled by every worker.
pub type ShutdownFlag = Arc<AtomicBool>;

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);
const PREVIEW_BYTES: usize = 128;

/// Read-only state shared by all workers.
#[derive(Debug)]
pub struct WorkerShared {
    pub ports: PortSet,
    pub policy: WindowPolicy,
    pub queue: QueueOptions,
    pub debug: bool,
}

// ==========================================
// 单包决策
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    NotTcpIpv4,
    UnmonitoredPort,
    Unmatched,
    CategoryDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pass(PassReason),
    Rewrite {
        category: Category,
        from: u16,
        to: u16,
        packet: Vec<u8>,
    },
}

pub struct PacketHandler<R> {
    queue_num: u16,
    shared: Arc<WorkerShared>,
    rng: R,
}

impl<R: Rng> PacketHandler<R> {
    pub fn new(queue_num: u16, shared: Arc<WorkerShared>, rng: R) -> Self {
        Self {
            queue_num,
            shared,
            rng,
        }
    }

    /// decode → classify → port match → policy → reencode.
    pub fn handle(&mut self, bytes: &[u8]) -> Result<Decision, EncodeError> {
        let Some(seg) = packet::decode(bytes) else {
            return Ok(Decision::Pass(PassReason::NotTcpIpv4));
        };
        let class = seg.classify();

        if !self.shared.ports.contains(seg.source_port()) {
            return Ok(Decision::Pass(PassReason::UnmonitoredPort));
        }
        let Some(category) = class.category() else {
            return Ok(Decision::Pass(PassReason::Unmatched));
        };
        let Some(window) = self.shared.policy.select(class, &mut self.rng) else {
            return Ok(Decision::Pass(PassReason::CategoryDisabled));
        };

        let packet = seg.reencode(window)?;
        if self.shared.debug {
            self.preview(&seg, window, &packet);
        }

        Ok(Decision::Rewrite {
            category,
            from: seg.window(),
            to: window,
            packet,
        })
    }

    fn preview(&self, seg: &TcpSegment<'_>, window: u16, packet: &[u8]) {
        debug!(
            "[queue {}] {} flags={} window {} -> {}",
            self.queue_num,
            FiveTuple::from(seg),
            seg.flags(),
            seg.window(),
            window
        );
        debug!("[queue {}] packetBytes len: {}", self.queue_num, packet.len());
        debug!("[queue {}] packetBytes dump:\n{}", self.queue_num, packet::hex_dump(packet, PREVIEW_BYTES));
        if !seg.payload().is_empty() {
            debug!(
                "[queue {}] payload: {}",
                self.queue_num,
                packet::ascii_preview(seg.payload(), PREVIEW_BYTES)
            );
        }
    }
}

// ==========================================
// Worker 状态机
// Idle → Subscribed → Receiving ⇄ Processing → ShuttingDown → Closed
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Subscribed,
    Receiving,
    Processing,
    ShuttingDown,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub rewritten: u64,
    pub passed: u64,
    pub encode_failures: u64,
    pub verdict_failures: u64,
    pub recv_failures: u64,
    pub slow_verdicts: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.received += other.received;
        self.rewritten += other.rewritten;
        self.passed += other.passed;
        self.encode_failures += other.encode_failures;
        self.verdict_failures += other.verdict_failures;
        self.recv_failures += other.recv_failures;
        self.slow_verdicts += other.slow_verdicts;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub queue_num: u16,
    pub category: Category,
    pub subscribed: bool,
    pub state: WorkerState,
    pub stats: WorkerStats,
}

pub struct QueueWorker<B: Backend> {
    queue_num: u16,
    category: Category,
    backend: Arc<B>,
    shutdown: ShutdownFlag,
    handler: PacketHandler<StdRng>,
    state: WorkerState,
    stats: WorkerStats,
}

impl<B: Backend> QueueWorker<B> {
    pub fn new(
        queue_num: u16,
        category: Category,
        backend: Arc<B>,
        shared: Arc<WorkerShared>,
        shutdown: ShutdownFlag,
        seed: u64,
    ) -> Self {
        // 每个 worker 自带随机源，种子 = 进程种子 + 队列号
        let rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(queue_num)));
        Self {
            queue_num,
            category,
            backend,
            shutdown,
            handler: PacketHandler::new(queue_num, shared, rng),
            state: WorkerState::Idle,
            stats: WorkerStats::default(),
        }
    }

    fn transition(&mut self, next: WorkerState) {
        trace!("[queue {}] {:?} -> {:?}", self.queue_num, self.state, next);
        self.state = next;
    }

    fn cancelled(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn report(&self, subscribed: bool) -> WorkerReport {
        WorkerReport {
            queue_num: self.queue_num,
            category: self.category,
            subscribed,
            state: self.state,
            stats: self.stats,
        }
    }

    pub fn run(mut self) -> WorkerReport {
        let options = self.handler.shared.queue;
        let mut queue = match self.backend.subscribe(self.queue_num, &options) {
            Ok(q) => q,
            Err(e) => {
                // 不重试：池子少一个 worker 继续跑
                error!("[{}] could not open queue {}: {}", self.category, self.queue_num, e);
                self.transition(WorkerState::Closed);
                return self.report(false);
            }
        };
        self.transition(WorkerState::Subscribed);

        while !self.cancelled() {
            self.transition(WorkerState::Receiving);
            match queue.recv() {
                Ok(Some(packet)) => {
                    self.transition(WorkerState::Processing);
                    self.process(&mut queue, PacketContext::new(packet, self.queue_num));
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.recv_failures += 1;
                    if self.stats.recv_failures.is_power_of_two() {
                        warn!(
                            "[queue {}] receive error ({} so far): {}",
                            self.queue_num, self.stats.recv_failures, e
                        );
                    }
                    thread::sleep(RECV_ERROR_BACKOFF);
                }
            }
        }

        self.transition(WorkerState::ShuttingDown);
        drop(queue);
        self.transition(WorkerState::Closed);
        debug!("[queue {}] closed: {:?}", self.queue_num, self.stats);
        self.report(true)
    }

    fn process(
        &mut self,
        queue: &mut B::Queue,
        ctx: PacketContext<<B::Queue as PacketQueue>::Packet>,
    ) {
        self.stats.received += 1;

        let verdict = match self.handler.handle(ctx.msg.as_ref()) {
            Ok(Decision::Pass(reason)) => {
                trace!("[queue {}] pass: {:?}", self.queue_num, reason);
                self.stats.passed += 1;
                Verdict::Accept
            }
            Ok(Decision::Rewrite { packet, .. }) => {
                self.stats.rewritten += 1;
                Verdict::AcceptModified(packet)
            }
            Err(e) => {
                // fail open：原包放行
                warn!("[queue {}] re-encode failed, accepting original: {}", self.queue_num, e);
                self.stats.encode_failures += 1;
                Verdict::Accept
            }
        };

        let PacketContext {
            msg,
            queue_num,
            arrival_time,
        } = ctx;
        if let Err(e) = queue.verdict(msg, verdict) {
            self.stats.verdict_failures += 1;
            error!("[queue {}] SetVerdict error: {}", queue_num, e);
        }

        // 从收包到判决写完的总耗时
        let elapsed = arrival_time.elapsed();
        if elapsed > self.handler.shared.queue.write_timeout {
            self.stats.slow_verdicts += 1;
            debug!("[queue {}] slow verdict: {:?}", queue_num, elapsed);
        }
        self.transition(WorkerState::Receiving);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use etherparse::PacketBuilder;

    fn shared(config: &Config) -> Arc<WorkerShared> {
        let (ports, _) = PortSet::parse(&config.ports);
        Arc::new(WorkerShared {
            ports,
            policy: WindowPolicy::from_config(config),
            queue: config.queue,
            debug: config.debug,
        })
    }

    fn segment(sport: u16, syn: bool, psh: bool, fin: bool) -> Vec<u8> {
        let mut b = PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(sport, 40000, 10, 64240)
            .ack(20);
        if syn {
            b = b.syn();
        }
        if psh {
            b = b.psh();
        }
        if fin {
            b = b.fin();
        }
        let mut out = Vec::new();
        b.write(&mut out, b"data").unwrap();
        out
    }

    fn handler(config: &Config) -> PacketHandler<StdRng> {
        PacketHandler::new(1, shared(config), StdRng::seed_from_u64(11))
    }

    #[test]
    fn syn_ack_on_monitored_port_is_jittered() {
        let mut h = handler(&Config::default());
        for _ in 0..100 {
            match h.handle(&segment(443, true, false, false)).unwrap() {
                Decision::Rewrite { category, from, to, packet } => {
                    assert_eq!(category, Category::SynAck);
                    assert_eq!(from, 64240);
                    assert!((3..=7).contains(&to));
                    assert_eq!(packet::decode(&packet).unwrap().window(), to);
                }
                other => panic!("expected rewrite, got {other:?}"),
            }
        }
    }

    #[test]
    fn randomize_off_gives_exact_window() {
        let mut config = Config::default();
        config.randomize = false;
        let mut h = handler(&config);
        for (syn, psh, fin) in [(true, false, false), (false, false, false), (false, true, false), (false, false, true)] {
            match h.handle(&segment(443, syn, psh, fin)).unwrap() {
                Decision::Rewrite { to, .. } => assert_eq!(to, 5),
                other => panic!("expected rewrite, got {other:?}"),
            }
        }
    }

    #[test]
    fn unmonitored_port_passes_for_any_flags() {
        let mut h = handler(&Config::default());
        for (syn, psh, fin) in [(true, false, false), (false, false, false), (false, true, false), (false, false, true)] {
            assert_eq!(
                h.handle(&segment(22, syn, psh, fin)).unwrap(),
                Decision::Pass(PassReason::UnmonitoredPort)
            );
        }
    }

    #[test]
    fn disabled_category_passes() {
        let mut config = Config::default();
        config.category_mut(Category::PshAck).enabled = false;
        let mut h = handler(&config);
        assert_eq!(
            h.handle(&segment(80, false, true, false)).unwrap(),
            Decision::Pass(PassReason::CategoryDisabled)
        );
    }

    #[test]
    fn non_tcp_passes() {
        let mut h = handler(&Config::default());
        assert_eq!(h.handle(&[0u8; 8]).unwrap(), Decision::Pass(PassReason::NotTcpIpv4));

        let udp = PacketBuilder::ipv4([1, 1, 1, 1], [2, 2, 2, 2], 64).udp(443, 53);
        let mut bytes = Vec::new();
        udp.write(&mut bytes, b"q").unwrap();
        assert_eq!(h.handle(&bytes).unwrap(), Decision::Pass(PassReason::NotTcpIpv4));
    }

    #[test]
    fn rst_ack_is_unmatched() {
        let b = PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(443, 40000, 10, 64240)
            .rst()
            .ack(1);
        let mut bytes = Vec::new();
        b.write(&mut bytes, &[]).unwrap();
        let mut h = handler(&Config::default());
        assert_eq!(h.handle(&bytes).unwrap(), Decision::Pass(PassReason::Unmatched));
    }

    #[test]
    fn debug_preview_does_not_change_result() {
        let mut config = Config::default();
        config.debug = true;
        config.randomize = false;
        let mut h = handler(&config);
        assert!(matches!(
            h.handle(&segment(8888, false, true, false)).unwrap(),
            Decision::Rewrite { to: 5, .. }
        ));
    }

    #[test]
    fn stats_merge_adds_fields() {
        let mut a = WorkerStats {
            received: 3,
            rewritten: 2,
            passed: 1,
            ..WorkerStats::default()
        };
        let b = WorkerStats {
            received: 1,
            verdict_failures: 1,
            ..WorkerStats::default()
        };
        a.merge(&b);
        assert_eq!(a.received, 4);
        assert_eq!(a.verdict_failures, 1);
        assert_eq!(a.rewritten, 2);
    }
}
