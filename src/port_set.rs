use std::collections::HashSet;

use crate::error::ConfigError;

/// Monitored source ports. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet(HashSet<u16>);

impl PortSet {
    /// Accepts commas and/or whitespace as separators. Blank entries are
    /// skipped; anything that is not a port in 1..=65535 is reported back.
    pub fn parse(list: &str) -> (Self, Vec<ConfigError>) {
        let mut ports = HashSet::new();
        let mut rejected = Vec::new();

        for entry in list.split(|c: char| c == ',' || c.is_whitespace()) {
            if entry.is_empty() {
                continue;
            }
            match entry.parse::<u16>() {
                Ok(port) if port != 0 => {
                    ports.insert(port);
                }
                _ => rejected.push(ConfigError::Port {
                    entry: entry.to_string(),
                }),
            }
        }

        (Self(ports), rejected)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(&port)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sorted(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.0.iter().copied().collect();
        ports.sort_unstable();
        ports
    }
}

impl FromIterator<u16> for PortSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_list() {
        let (set, rejected) = PortSet::parse("80,443,8888,9999");
        assert!(rejected.is_empty());
        assert_eq!(set.sorted(), vec![80, 443, 8888, 9999]);
        assert!(set.contains(443));
        assert!(!set.contains(22));
    }

    #[test]
    fn drops_malformed_entries() {
        let (set, rejected) = PortSet::parse("80, http ,443,70000,0,-1,,");
        assert_eq!(set.sorted(), vec![80, 443]);
        let entries: Vec<String> = rejected
            .into_iter()
            .map(|e| match e {
                ConfigError::Port { entry } => entry,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(entries, ["http", "70000", "0", "-1"]);
    }

    #[test]
    fn file_contents_with_newlines() {
        let (set, rejected) = PortSet::parse("80\n443\r\n8080,\n");
        assert!(rejected.is_empty());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn duplicates_collapse() {
        let (set, _) = PortSet::parse("443,443, 443");
        assert_eq!(set.len(), 1);
        assert!(PortSet::parse("").0.is_empty());
    }
}
