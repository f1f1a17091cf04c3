use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{error, info, warn};

use crate::{
    backend::{Backend, RedirectRule},
    config::Config,
    error::{ConfigError, FirewallError, PipelineError},
    packet::Category,
    policy::WindowPolicy,
    pool::{PoolReport, WorkerPool},
    port_set::PortSet,
    queue_range::QueueRange,
    worker::{ShutdownFlag, WorkerShared},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSummary {
    pub ports: Vec<u16>,
    pub categories: Vec<(Category, QueueRange)>,
    pub workers: usize,
}

struct Running {
    pools: Vec<WorkerPool>,
    rules: Vec<RedirectRule>,
}

enum State {
    Idle,
    Running(Running),
    Stopped,
}

// ==========================================
// 总控：装规则 → 起池子；停池子 → 拆规则
// ==========================================
pub struct Pipeline<B: Backend> {
    backend: Arc<B>,
    config: Config,
    shutdown: ShutdownFlag,
    state: State,
}

impl<B: Backend> Pipeline<B> {
    pub fn new(backend: B, config: Config) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: State::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    pub fn start(&mut self) -> Result<StartSummary, PipelineError> {
        if !matches!(self.state, State::Idle) {
            return Err(PipelineError::AlreadyStarted);
        }

        // 1. 防火墙子系统不可用直接失败
        self.backend.probe()?;

        // 2. 端口集合
        let (ports, rejected) = PortSet::parse(&self.config.ports);
        for e in &rejected {
            warn!("{e}, dropped");
        }
        if ports.is_empty() {
            return Err(ConfigError::EmptyPortSet.into());
        }
        info!("monitoring source ports {:?}", ports.sorted());

        // 3. 逐个分类：解析区间 → 检查重叠 → 装规则，任何一步失败只禁用该分类
        let mut active: Vec<(Category, QueueRange)> = Vec::new();
        let mut rules = Vec::new();
        for entry in self.config.enabled_categories() {
            let category = entry.category;
            let range = match QueueRange::parse(&entry.queue_balance) {
                Ok(range) => range,
                Err(e) => {
                    error!("[{category}] {e}; category disabled");
                    continue;
                }
            };
            if let Some(&(other, taken)) = active.iter().find(|(_, r)| r.overlaps(&range)) {
                let e = ConfigError::OverlappingRange {
                    category,
                    range: range.to_string(),
                    other,
                };
                error!("{e} ({taken}); category disabled");
                continue;
            }
            match self.install_category(category, range, &ports) {
                Ok(installed) => {
                    rules.extend(installed);
                    active.push((category, range));
                }
                Err(e) => error!("[{category}] firewall rule install failed: {e}; category disabled"),
            }
        }
        if active.is_empty() {
            return Err(PipelineError::NoActiveCategory);
        }

        // 4. 起 worker
        let summary_ports = ports.sorted();
        let shared = Arc::new(WorkerShared {
            ports,
            policy: WindowPolicy::from_config(&self.config),
            queue: self.config.queue,
            debug: self.config.debug,
        });
        let seed = self.config.seed.unwrap_or_else(rand::random);
        self.shutdown.store(false, Ordering::SeqCst);

        let pools: Vec<WorkerPool> = active
            .iter()
            .map(|&(category, range)| {
                WorkerPool::spawn(category, range, &self.backend, &shared, &self.shutdown, seed)
            })
            .collect();
        let workers = pools.iter().map(WorkerPool::len).sum();
        if pools.iter().all(WorkerPool::is_empty) {
            error!("no worker thread could be spawned; traffic passes only with --queue-bypass");
        }

        self.state = State::Running(Running { pools, rules });
        Ok(StartSummary {
            ports: summary_ports,
            categories: active,
            workers,
        })
    }

    /// Installs every rule of one category; on failure removes the ones
    /// already added so the category leaves nothing behind.
    fn install_category(
        &self,
        category: Category,
        range: QueueRange,
        ports: &PortSet,
    ) -> Result<Vec<RedirectRule>, FirewallError> {
        let rules = RedirectRule::for_category(category, range, ports, self.config.queue_bypass);
        for (i, rule) in rules.iter().enumerate() {
            if let Err(e) = self.backend.install_rule(rule) {
                for done in &rules[..i] {
                    if let Err(e) = self.backend.remove_rule(done) {
                        warn!("[{category}] rollback of rule for ports {} failed: {e}", done.port_list());
                    }
                }
                return Err(e);
            }
        }
        info!("[{category}] redirect rules installed ({}) -> queues {range}", rules.len());
        Ok(rules)
    }

    /// Cancels every worker, waits for all of them to close, then removes
    /// the firewall rules. No-op unless running.
    pub fn stop(&mut self) -> Vec<PoolReport> {
        let running = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Running(running) => running,
            other => {
                self.state = other;
                return Vec::new();
            }
        };

        self.shutdown.store(true, Ordering::SeqCst);
        let total: usize = running.pools.iter().map(WorkerPool::len).sum();
        info!("stopping {total} workers");
        let reports: Vec<PoolReport> = running.pools.into_iter().map(WorkerPool::join).collect();

        // worker 全部关闭之后才拆规则
        let mut removed = 0;
        for rule in &running.rules {
            match self.backend.remove_rule(rule) {
                Ok(()) => removed += 1,
                Err(e) => error!("[{}] firewall rule removal failed: {e}", rule.category),
            }
        }
        info!("removed {removed}/{} firewall rules", running.rules.len());
        reports
    }
}

impl<B: Backend> Drop for Pipeline<B> {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}
