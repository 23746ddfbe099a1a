//! Port bookkeeping and discovery

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::SerialConfig;
use crate::error::{Result, SerialError};

/// Set of ports currently held open
///
/// Clones share the same set. Transports claim their port when opened and
/// release it when closed, so two transports never hold the same port.
#[derive(Debug, Clone, Default)]
pub struct PortRegistry {
    open: Arc<Mutex<BTreeSet<String>>>,
}

impl PortRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn ports(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `port` as open
    pub fn claim(&self, port: &str) -> Result<()> {
        if !self.ports().insert(port.to_string()) {
            log::warn!("Port {} is already open", port);
            return Err(SerialError::PortInUse(port.to_string()));
        }
        log::debug!("Claimed port {}", port);
        Ok(())
    }

    /// Forget `port`
    pub fn release(&self, port: &str) {
        if self.ports().remove(port) {
            log::debug!("Released port {}", port);
        }
    }

    /// Whether `port` is held open
    pub fn is_open(&self, port: &str) -> bool {
        self.ports().contains(port)
    }

    /// All ports held open, sorted
    pub fn open_ports(&self) -> Vec<String> {
        self.ports().iter().cloned().collect()
    }
}

/// Candidate configurations for every port not already open
///
/// Settings other than the port name are copied from `template`.
pub fn configs_for(
    ports: impl IntoIterator<Item = String>,
    registry: &PortRegistry,
    template: &SerialConfig,
) -> Vec<SerialConfig> {
    ports
        .into_iter()
        .filter(|port| !registry.is_open(port))
        .map(|port| SerialConfig {
            port,
            ..template.clone()
        })
        .collect()
}

/// Candidate configurations for the serial ports present on this system
pub fn available_configs(registry: &PortRegistry, template: &SerialConfig) -> Result<Vec<SerialConfig>> {
    let ports = serialport::available_ports()?;
    log::debug!("Found {} serial port(s)", ports.len());
    Ok(configs_for(
        ports.into_iter().map(|p| p.port_name),
        registry,
        template,
    ))
}
