use std::sync::{Arc, RwLock};

use crate::{alerts::AlertCollector, config::TimeoutConfig, tools::Toolbox};

/// Host operating system family, detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Other,
        }
    }
}

/// Identity of the host the agent runs on.
///
/// The host name lookup is cached until [`HostContext::invalidate`] is called.
#[derive(Debug)]
pub struct HostContext {
    override_name: Option<String>,
    cached: RwLock<Option<String>>,
    platform: Platform,
}

impl HostContext {
    pub fn new(override_name: Option<String>, platform: Platform) -> Self {
        Self {
            override_name,
            cached: RwLock::new(None),
            platform,
        }
    }

    pub fn detect(override_name: Option<String>) -> Self {
        Self::new(override_name, Platform::detect())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn hostname(&self) -> String {
        if let Some(name) = &self.override_name {
            return name.clone();
        }

        if let Some(name) = self.cached.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return name.clone();
        }

        let name = lookup_hostname();
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = Some(name.clone());
        name
    }

    /// Forget the cached host name so the next lookup hits the system again.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

fn lookup_hostname() -> String {
    let from_env = std::env::var("HOSTNAME")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    from_env
        .or_else(|| {
            ["/proc/sys/kernel/hostname", "/etc/hostname"]
                .iter()
                .filter_map(|path| std::fs::read_to_string(path).ok())
                .map(|h| h.trim().to_string())
                .find(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
        .to_lowercase()
}

/// Shared collaborators handed to every alert at construction time.
#[derive(Clone)]
pub struct AlertContext {
    pub collector: Arc<AlertCollector>,
    pub tools: Toolbox,
    pub host: Arc<HostContext>,
    pub timeouts: TimeoutConfig,
}

impl AlertContext {
    pub fn new(collector: Arc<AlertCollector>, tools: Toolbox, host: Arc<HostContext>, timeouts: TimeoutConfig) -> Self {
        Self {
            collector,
            tools,
            host,
            timeouts,
        }
    }
}
