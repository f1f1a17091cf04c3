use std::{process::ExitCode, sync::mpsc};

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};

mod cli;

use cli::{Cli, Command, ServiceArgs};
use nfq_window::{Pipeline, PlatformBackend, logger};

fn warn_if_not_root() {
    #[cfg(unix)]
    {
        // SAFETY: geteuid 没有前置条件
        if unsafe { libc::geteuid() } != 0 {
            warn!("not running as root; iptables and NFQUEUE will most likely refuse");
        }
    }
}

fn run_service(args: &ServiceArgs) -> anyhow::Result<()> {
    info!("Run");
    warn_if_not_root();

    let config = args.to_config().context("invalid configuration")?;

    // 先挂信号，再装规则，避免启动途中被打断留下残余规则
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to register signal handler")?;

    let mut pipeline = Pipeline::new(PlatformBackend::default(), config);
    let summary = pipeline.start().context("failed to start pipeline")?;
    for (category, range) in &summary.categories {
        info!("{category}: queues {range}");
    }
    info!("{} workers serving ports {:?}", summary.workers, summary.ports);

    let _ = rx.recv();
    info!("shutdown signal received");

    for report in pipeline.stop() {
        info!(
            "[{}] queues {}: {}/{} workers subscribed, {:?}",
            report.category, report.range, report.subscribed, report.spawned, report.stats
        );
    }
    info!("exit");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Service(args) => {
            logger::init(args.debug);
            run_service(args)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
