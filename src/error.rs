use std::{io, path::PathBuf};

use thiserror::Error;

use crate::packet::Category;

// ==========================================
// 配置错误：本地恢复（丢弃条目 / 禁用分类）
// ==========================================
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid queue range {spec:?}: {reason}")]
    QueueRange { spec: String, reason: &'static str },

    #[error("invalid port entry {entry:?}")]
    Port { entry: String },

    #[error("cannot read port file {}: {source}", path.display())]
    PortFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("monitored port set is empty")]
    EmptyPortSet,

    #[error("queue range {range} of {category} overlaps {other}")]
    OverlappingRange {
        category: Category,
        range: String,
        other: Category,
    },
}

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("firewall rules are not supported on this platform")]
    Unsupported,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} {action} rejected ({status}): {stderr}")]
    Rejected {
        program: String,
        action: &'static str,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("packet queues are not supported on this platform")]
    Unsupported,

    #[error("cannot open queue {queue_num}: {source}")]
    Open {
        queue_num: u16,
        #[source]
        source: io::Error,
    },

    #[error("receive failed: {0}")]
    Recv(#[source] io::Error),

    #[error("verdict rejected: {0}")]
    Verdict(#[source] io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("segment of {len} bytes does not fit an IPv4 packet")]
    TooLarge { len: usize },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline already started")]
    AlreadyStarted,

    #[error("firewall subsystem unavailable: {0}")]
    Firewall(#[from] FirewallError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no flag category could be activated")]
    NoActiveCategory,
}
