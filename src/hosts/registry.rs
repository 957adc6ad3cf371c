// ABOUTME: HostEntry and HostRegistry types with lookup-by-name and benchmark role resolution

use crate::error::{BenchError, Result};
use std::collections::HashSet;
use std::fmt;

/// Connection parameters for one lab VM.
///
/// The password is kept private so it cannot leak through `Debug` or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    password: String,
}

impl HostEntry {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Human readable identity used in error messages, e.g. `vm1 (localhost:2222)`.
    pub fn identity(&self) -> String {
        format!("{} ({}:{})", self.name, self.address, self.port)
    }
}

impl fmt::Debug for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEntry")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which side of a benchmark a host plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Sender,
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => write!(f, "sender"),
            Role::Receiver => write!(f, "receiver"),
        }
    }
}

/// Read-only set of hosts, kept in configuration order.
#[derive(Debug, Clone)]
pub struct HostRegistry {
    entries: Vec<HostEntry>,
    sender: String,
    receiver: String,
}

impl HostRegistry {
    /// Build a registry. The first host becomes the sender and the second
    /// (or the first, when only one exists) the receiver until roles are
    /// assigned explicitly.
    pub fn new(entries: Vec<HostEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(BenchError::DuplicateHost(entry.name.clone()));
            }
        }

        let sender = entries.first().ok_or(BenchError::NoHosts)?.name.clone();
        let receiver = entries.get(1).map_or_else(|| sender.clone(), |e| e.name.clone());

        Ok(Self {
            entries,
            sender,
            receiver,
        })
    }

    /// Assign benchmark roles to registered hosts.
    pub fn with_roles(mut self, sender: Option<&str>, receiver: Option<&str>) -> Result<Self> {
        if let Some(name) = sender {
            self.sender = self.lookup(name)?.name.clone();
        }
        if let Some(name) = receiver {
            self.receiver = self.lookup(name)?.name.clone();
        }
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Result<&HostEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| BenchError::UnknownHost(name.to_string()))
    }

    pub fn for_role(&self, role: Role) -> &HostEntry {
        let name = match role {
            Role::Sender => &self.sender,
            Role::Receiver => &self.receiver,
        };
        // Role names are validated on assignment, so the entry is always present.
        self.entries
            .iter()
            .find(|e| &e.name == name)
            .unwrap_or(&self.entries[0])
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}
