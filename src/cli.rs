use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};

use nfq_window::{
    config::{Config, DEFAULT_JITTER, DEFAULT_MAX_QUEUE_LEN, DEFAULT_PORT_FILE, read_port_file},
    error::ConfigError,
    packet::Category,
};

/// nfq_window: rewrites the TCP window of outbound segments via NFQUEUE.
#[derive(Parser, Debug)]
#[command(name = "nfq_window", version, about = "TCP window rewriting service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the service; runs until SIGINT/SIGTERM.
    Service(ServiceArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryArg {
    SynAck,
    Ack,
    PshAck,
    FinAck,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::SynAck => Category::SynAck,
            CategoryArg::Ack => Category::PureAck,
            CategoryArg::PshAck => Category::PshAck,
            CategoryArg::FinAck => Category::FinAck,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    // ── Logging ──────────────────────────────────────────────────────────────

    /// Debug logging, including a hex preview of every rewritten packet.
    #[arg(short = 'd', long)]
    pub debug: bool,

    // ── Ports ────────────────────────────────────────────────────────────────

    /// Monitored source ports, e.g. "80,443". Overrides the port file.
    #[arg(short = 'p', long, value_name = "LIST")]
    pub ports: Option<String>,

    /// File holding the monitored port list; ignored when absent.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PORT_FILE)]
    pub port_file: PathBuf,

    // ── Queue ranges ("start:end", end exclusive) ────────────────────────────

    #[arg(long, value_name = "START:END")]
    pub synack_queues: Option<String>,

    #[arg(long, value_name = "START:END")]
    pub ack_queues: Option<String>,

    #[arg(long, value_name = "START:END")]
    pub pshack_queues: Option<String>,

    #[arg(long, value_name = "START:END")]
    pub finack_queues: Option<String>,

    /// Flag categories to leave alone.
    #[arg(long, value_enum, value_delimiter = ',', value_name = "CATEGORY")]
    pub disable: Vec<CategoryArg>,

    // ── Window policy ────────────────────────────────────────────────────────

    #[arg(long, value_name = "N")]
    pub synack_window: Option<u16>,

    #[arg(long, value_name = "N")]
    pub ack_window: Option<u16>,

    #[arg(long, value_name = "N")]
    pub pshack_window: Option<u16>,

    #[arg(long, value_name = "N")]
    pub finack_window: Option<u16>,

    /// Jitter half-width applied around every base window.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_JITTER)]
    pub jitter: u16,

    /// Always use the exact base window.
    #[arg(long)]
    pub no_random: bool,

    /// Fixed seed for the jitter generator.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    // ── Kernel queue ─────────────────────────────────────────────────────────

    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_QUEUE_LEN)]
    pub max_queue_len: u32,

    #[arg(long, value_name = "MS", default_value_t = 15)]
    pub write_timeout_ms: u64,

    /// Let the kernel accept packets when no worker is bound to a queue.
    #[arg(long)]
    pub queue_bypass: bool,
}

impl ServiceArgs {
    pub fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        // 端口优先级：--ports > 端口文件 > 内置默认
        if let Some(ports) = &self.ports {
            config.ports = ports.clone();
        } else if let Some(ports) = read_port_file(&self.port_file)? {
            config.ports = ports;
        }

        let overrides = [
            (Category::SynAck, &self.synack_queues, self.synack_window),
            (Category::PureAck, &self.ack_queues, self.ack_window),
            (Category::PshAck, &self.pshack_queues, self.pshack_window),
            (Category::FinAck, &self.finack_queues, self.finack_window),
        ];
        for (category, queues, window) in overrides {
            let entry = config.category_mut(category);
            if let Some(queues) = queues {
                entry.queue_balance = queues.clone();
            }
            if let Some(window) = window {
                entry.window = window;
            }
            entry.jitter = self.jitter;
        }
        for &category in &self.disable {
            config.category_mut(category.into()).enabled = false;
        }

        config.randomize = !self.no_random;
        config.seed = self.seed;
        config.queue.max_len = self.max_queue_len;
        config.queue.write_timeout = Duration::from_millis(self.write_timeout_ms);
        config.queue_bypass = self.queue_bypass;
        config.debug = self.debug;
        Ok(config)
    }
}
