//! Rewrites the advertised TCP receive window of outbound segments that the
//! firewall diverts into NFQUEUE, then hands them back to the kernel.

pub mod backend;
pub mod config;
pub mod error;
pub mod five_tuple;
pub mod logger;
pub mod packet;
pub mod packet_context;
pub mod pipeline;
pub mod policy;
pub mod pool;
pub mod port_set;
pub mod queue_range;
pub mod worker;

pub use backend::{Backend, PacketQueue, PlatformBackend, RedirectRule, Verdict};
pub use config::Config;
pub use pipeline::{Pipeline, StartSummary};
