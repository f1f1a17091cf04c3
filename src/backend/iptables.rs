use std::process::{Command, Output};

use log::debug;

use crate::{backend::RedirectRule, error::FirewallError};

const TABLE: &str = "filter";
const CHAIN: &str = "OUTPUT";
const FLAG_MASK: &str = "SYN,RST,ACK,FIN,PSH";

/// Rule body after `-A/-C/-D OUTPUT`.
fn rule_spec(rule: &RedirectRule) -> Vec<String> {
    let mut args = Vec::from(["-p", "tcp", "-m", "multiport", "--sports"].map(String::from));
    args.push(rule.port_list());
    args.extend(["--tcp-flags", FLAG_MASK, rule.category.tcp_flags_pattern(), "-j", "NFQUEUE"].map(String::from));

    // 队列区间是左闭右开，iptables 的 balance 是闭区间
    if rule.queues.count() == 1 {
        args.push("--queue-num".to_string());
        args.push(rule.queues.start().to_string());
    } else {
        args.push("--queue-balance".to_string());
        args.push(format!("{}:{}", rule.queues.start(), rule.queues.last()));
    }
    if rule.bypass {
        args.push("--queue-bypass".to_string());
    }
    args
}

#[derive(Debug, Clone)]
pub struct Iptables {
    program: String,
}

impl Default for Iptables {
    fn default() -> Self {
        Self::new("iptables")
    }
}

impl Iptables {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn run(&self, op: &str, rule: Option<&RedirectRule>) -> Result<Output, FirewallError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-w", "-t", TABLE, op, CHAIN]);
        if let Some(rule) = rule {
            cmd.args(rule_spec(rule));
        }
        debug!("{} {:?}", self.program, cmd.get_args().collect::<Vec<_>>());
        cmd.output().map_err(|source| FirewallError::Spawn {
            program: self.program.clone(),
            source,
        })
    }

    fn rejected(&self, action: &'static str, output: &Output) -> FirewallError {
        FirewallError::Rejected {
            program: self.program.clone(),
            action,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Lists the OUTPUT chain; fails without root or without iptables.
    pub fn probe(&self) -> Result<(), FirewallError> {
        let output = self.run("-S", None)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.rejected("list", &output))
        }
    }

    pub fn exists(&self, rule: &RedirectRule) -> Result<bool, FirewallError> {
        let output = self.run("-C", Some(rule))?;
        match output.status.code() {
            Some(0) => Ok(true),
            // -C 找不到规则时退出码为 1
            Some(1) => Ok(false),
            _ => Err(self.rejected("check", &output)),
        }
    }

    pub fn append_unique(&self, rule: &RedirectRule) -> Result<(), FirewallError> {
        if self.exists(rule)? {
            debug!("{} rule for ports {} already present", rule.category, rule.port_list());
            return Ok(());
        }
        let output = self.run("-A", Some(rule))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.rejected("append", &output))
        }
    }

    pub fn delete(&self, rule: &RedirectRule) -> Result<(), FirewallError> {
        let output = self.run("-D", Some(rule))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.rejected("delete", &output))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{packet::Category, queue_range::QueueRange};

    fn rule(category: Category, range: &str, bypass: bool) -> RedirectRule {
        RedirectRule {
            category,
            ports: vec![80, 443, 8888, 9999],
            queues: QueueRange::parse(range).unwrap(),
            bypass,
        }
    }

    #[test]
    fn balance_range_matches_served_queues() {
        let spec = rule_spec(&rule(Category::SynAck, "1000:4000", false));
        assert_eq!(
            spec,
            [
                "-p", "tcp", "-m", "multiport", "--sports", "80,443,8888,9999", "--tcp-flags",
                "SYN,RST,ACK,FIN,PSH", "SYN,ACK", "-j", "NFQUEUE", "--queue-balance", "1000:3999",
            ]
        );
    }

    #[test]
    fn single_queue_uses_queue_num() {
        let spec = rule_spec(&rule(Category::PureAck, "7:8", true));
        let tail = &spec[spec.len() - 3..];
        assert_eq!(tail, ["--queue-num", "7", "--queue-bypass"]);
        assert!(spec.contains(&"ACK".to_string()));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let ipt = Iptables::new("/nonexistent/iptables-binary");
        assert!(matches!(ipt.probe(), Err(FirewallError::Spawn { .. })));
        let r = rule(Category::FinAck, "1:3", false);
        assert!(matches!(ipt.append_unique(&r), Err(FirewallError::Spawn { .. })));
    }
}
