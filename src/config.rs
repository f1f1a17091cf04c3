use std::{fs, io, path::Path, time::Duration};

use crate::{error::ConfigError, packet::Category};

pub const DEFAULT_PORTS: &str = "80,443,8888,9999";
pub const DEFAULT_PORT_FILE: &str = "port.txt";

pub const DEFAULT_WINDOW: u16 = 5;
pub const DEFAULT_JITTER: u16 = 2;

pub const DEFAULT_MAX_QUEUE_LEN: u32 = 10000;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(15);
pub const DEFAULT_COPY_RANGE: u16 = 0xFFFF;

// ==========================================
// 每个标志分类一份配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub category: Category,
    pub enabled: bool,
    /// Raw "start:end" spec, parsed when the pipeline starts.
    pub queue_balance: String,
    pub window: u16,
    pub jitter: u16,
}

impl CategoryConfig {
    pub fn with_defaults(category: Category) -> Self {
        let queue_balance = match category {
            Category::SynAck => "1000:4000",
            Category::PureAck => "10000:13000",
            Category::PshAck => "45000:46000",
            Category::FinAck => "50000:51000",
        };
        Self {
            category,
            enabled: true,
            queue_balance: queue_balance.to_string(),
            window: DEFAULT_WINDOW,
            jitter: DEFAULT_JITTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub max_len: u32,
    pub copy_range: u16,
    pub write_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_QUEUE_LEN,
            copy_range: DEFAULT_COPY_RANGE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Everything the pipeline needs, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ports: String,
    pub categories: [CategoryConfig; 4],
    pub randomize: bool,
    pub queue: QueueOptions,
    pub queue_bypass: bool,
    pub debug: bool,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_string(),
            categories: Category::ALL.map(CategoryConfig::with_defaults),
            randomize: true,
            queue: QueueOptions::default(),
            queue_bypass: false,
            debug: false,
            seed: None,
        }
    }
}

impl Config {
    pub fn category(&self, category: Category) -> &CategoryConfig {
        &self.categories[category.index()]
    }

    pub fn category_mut(&mut self, category: Category) -> &mut CategoryConfig {
        &mut self.categories[category.index()]
    }

    pub fn enabled_categories(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.categories.iter().filter(|c| c.enabled)
    }
}

/// Reads the port list file. A missing file is not an error.
pub fn read_port_file(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::PortFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.ports, "80,443,8888,9999");
        assert_eq!(config.enabled_categories().count(), 4);
        assert_eq!(config.category(Category::PureAck).queue_balance, "10000:13000");
        assert_eq!(config.category(Category::FinAck).window, 5);
        assert_eq!(config.queue.max_len, 10000);
        assert_eq!(config.queue.write_timeout, Duration::from_millis(15));
        assert!(config.randomize);
    }

    #[test]
    fn categories_are_indexed_by_kind() {
        let mut config = Config::default();
        config.category_mut(Category::PshAck).enabled = false;
        for (i, c) in config.categories.iter().enumerate() {
            assert_eq!(c.category.index(), i);
        }
        assert_eq!(config.enabled_categories().count(), 3);
    }

    #[test]
    fn port_file_missing_is_none() {
        let path = std::env::temp_dir().join("nfq_window_no_such_port_file.txt");
        assert!(read_port_file(&path).unwrap().is_none());
    }

    #[test]
    fn port_file_contents_are_trimmed() {
        let path = std::env::temp_dir().join(format!("nfq_window_ports_{}.txt", std::process::id()));
        fs::write(&path, "22,443\n").unwrap();
        assert_eq!(read_port_file(&path).unwrap().as_deref(), Some("22,443"));
        fs::remove_file(&path).unwrap();
    }
}
