// ABOUTME: TOML configuration for hosts, credentials, timing, provisioning and benchmarks
//
// Resolution order for the file: `--config`, then `$DPDK_BENCH_CONFIG`, then
// `~/.dpdk-bench/config.toml`. Passwords should come from environment
// variables named by `password_env`; inline passwords still work but are
// logged as a warning.

use crate::error::BenchError;
use crate::hosts::{HostEntry, HostRegistry};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "DPDK_BENCH_CONFIG";
const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No password for host {host}: set `password_env` or `password`")]
    MissingCredential { host: String },

    #[error("Environment variable {var} for host {host} is not set")]
    MissingEnv { host: String, var: String },

    #[error("Cannot determine home directory for the default config path")]
    NoHomeDir,

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub roles: RoleConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleConfig {
    pub sender: Option<String>,
    pub receiver: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    pub drain_window_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            poll_interval_ms: 100,
            drain_window_ms: 200,
            connect_timeout_secs: 10,
        }
    }
}

impl TimingConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drain_window(&self) -> Duration {
        Duration::from_millis(self.drain_window_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub max_attempts: u32,
    pub pci_address: String,
    pub driver: String,
    pub hugepages: u32,
    pub hugepage_mount: String,
    pub uio_device: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pci_address: "0000:00:08.0".to_string(),
            driver: "uio_pci_generic".to_string(),
            hugepages: 1024,
            hugepage_mount: "/mnt/huge".to_string(),
            uio_device: "/dev/uio0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub work_dir: String,
    /// Stop streaming after this many seconds; 0 streams until Ctrl-C.
    pub stream_limit_secs: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            work_dir: "~/dpdk".to_string(),
            stream_limit_secs: 0,
        }
    }
}

impl BenchmarkConfig {
    pub fn stream_limit(&self) -> Option<Duration> {
        (self.stream_limit_secs > 0).then(|| Duration::from_secs(self.stream_limit_secs))
    }
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl AppConfig {
    /// Default config location, `~/.dpdk-bench/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".dpdk-bench").join("config.toml"))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Pick the config path from the CLI flag, the environment, or the default.
    pub fn resolve_path(cli: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = cli {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }
        Self::default_path()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), hosts = config.hosts.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provision.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "provision.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timing.poll_interval_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if let Some(host) = self.hosts.iter().find(|h| h.name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "hosts.name",
                reason: format!("host at {} has an empty name", host.address),
            });
        }
        Ok(())
    }

    /// Build the host registry, reading credentials from the process environment.
    pub fn build_registry(&self) -> Result<HostRegistry, BenchError> {
        self.build_registry_with(|var| std::env::var(var).ok())
    }

    /// Build the host registry with a custom environment lookup.
    pub fn build_registry_with<F>(&self, env: F) -> Result<HostRegistry, BenchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let entries = self
            .hosts
            .iter()
            .map(|host| {
                let password = host.resolve_password(&env)?;
                Ok(HostEntry::new(
                    host.name.clone(),
                    host.address.clone(),
                    host.port,
                    host.username.clone(),
                    password,
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        HostRegistry::new(entries)?
            .with_roles(self.roles.sender.as_deref(), self.roles.receiver.as_deref())
    }
}

impl HostConfig {
    fn resolve_password<F>(&self, env: &F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(var) = &self.password_env {
            return env(var).ok_or_else(|| ConfigError::MissingEnv {
                host: self.name.clone(),
                var: var.clone(),
            });
        }
        match &self.password {
            Some(password) => {
                warn!(host = %self.name, "Using plaintext password from config file");
                Ok(password.clone())
            }
            None => Err(ConfigError::MissingCredential {
                host: self.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::Role;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LAB_CONFIG: &str = r#"
[[hosts]]
name = "vm1"
address = "localhost"
port = 2222
username = "vm1"
password_env = "VM1_PASSWORD"

[[hosts]]
name = "vm2"
address = "localhost"
port = 2223
username = "vm2"
password = "1"
"#;

    fn env(var: &str) -> Option<String> {
        (var == "VM1_PASSWORD").then(|| "secret".to_string())
    }

    #[test]
    fn test_defaults_apply_when_sections_missing() {
        let config = AppConfig::from_toml_str(LAB_CONFIG).unwrap();
        assert_eq!(config.timing.settle(), Duration::from_secs(1));
        assert_eq!(config.timing.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.provision.max_attempts, 3);
        assert_eq!(config.provision.pci_address, "0000:00:08.0");
        assert_eq!(config.benchmark.work_dir, "~/dpdk");
        assert_eq!(config.benchmark.stream_limit(), None);
    }

    #[test]
    fn test_registry_resolves_credentials() {
        let config = AppConfig::from_toml_str(LAB_CONFIG).unwrap();
        let registry = config.build_registry_with(env).unwrap();

        let vm1 = registry.lookup("vm1").unwrap();
        assert_eq!(vm1.password(), "secret");
        assert_eq!(vm1.port, 2222);
        assert_eq!(registry.lookup("vm2").unwrap().password(), "1");
        assert_eq!(registry.for_role(Role::Sender).name, "vm1");
        assert_eq!(registry.for_role(Role::Receiver).name, "vm2");
    }

    #[test]
    fn test_missing_env_credential() {
        let config = AppConfig::from_toml_str(LAB_CONFIG).unwrap();
        let err = config.build_registry_with(|_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable VM1_PASSWORD for host vm1 is not set"
        );
    }

    #[test]
    fn test_missing_credential() {
        let config = AppConfig::from_toml_str(
            r#"
[[hosts]]
name = "bare"
address = "10.0.0.9"
username = "lab"
"#,
        )
        .unwrap();
        assert_eq!(config.hosts[0].port, 22);
        let err = config.build_registry_with(|_| None).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Config(ConfigError::MissingCredential { ref host }) if host == "bare"
        ));
    }

    #[test]
    fn test_roles_and_overrides() {
        let toml = format!(
            "{}\n[roles]\nsender = \"vm2\"\nreceiver = \"vm1\"\n\n[timing]\nsettle_ms = 0\n\n[provision]\nmax_attempts = 5\npci_address = \"0000:00:09.0\"\n\n[benchmark]\nwork_dir = \"/opt/bench\"\nstream_limit_secs = 30\n",
            LAB_CONFIG
        );
        let config = AppConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.timing.settle(), Duration::ZERO);
        assert_eq!(config.timing.drain_window(), Duration::from_millis(200));
        assert_eq!(config.provision.max_attempts, 5);
        assert_eq!(config.provision.driver, "uio_pci_generic");
        assert_eq!(config.benchmark.stream_limit(), Some(Duration::from_secs(30)));

        let registry = config.build_registry_with(env).unwrap();
        assert_eq!(registry.for_role(Role::Sender).name, "vm2");
        assert_eq!(registry.for_role(Role::Receiver).name, "vm1");
    }

    #[test]
    fn test_unknown_role_host_rejected() {
        let toml = format!("{}\n[roles]\nreceiver = \"vm9\"\n", LAB_CONFIG);
        let config = AppConfig::from_toml_str(&toml).unwrap();
        let err = config.build_registry_with(env).unwrap_err();
        assert!(matches!(err, BenchError::UnknownHost(name) if name == "vm9"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let toml = format!("{}\n[provision]\nmax_attempts = 0\n", LAB_CONFIG);
        assert!(matches!(
            AppConfig::from_toml_str(&toml),
            Err(ConfigError::Invalid { field: "provision.max_attempts", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(LAB_CONFIG.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.hosts[1].name, "vm2");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_resolve_path_prefers_cli_flag() {
        let path = AppConfig::resolve_path(Some(Path::new("/tmp/lab.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/lab.toml"));
    }

    #[test]
    fn test_resolve_path_falls_back_to_env() {
        std::env::set_var(CONFIG_ENV_VAR, "/srv/lab/dpdk-bench.toml");
        let from_env = AppConfig::resolve_path(None);
        let from_flag = AppConfig::resolve_path(Some(Path::new("/tmp/lab.toml")));
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(from_env.unwrap(), PathBuf::from("/srv/lab/dpdk-bench.toml"));
        assert_eq!(from_flag.unwrap(), PathBuf::from("/tmp/lab.toml"));
    }
}
