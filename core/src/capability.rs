use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Envelope version of the published capabilities document
pub const CAPABILITIES_ENVELOPE_VERSION: &str = "20160207";

/// One interface advertised by a capability agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityConfiguration {
    #[serde(rename = "type")]
    pub interface_type: String,
    #[serde(rename = "interface")]
    pub interface_name: String,
    pub version: String,
}

impl CapabilityConfiguration {
    pub fn interface(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            interface_type: "AlexaInterface".to_string(),
            interface_name: name.into(),
            version: version.into(),
        }
    }

    fn is_valid(&self) -> bool {
        !self.interface_type.trim().is_empty()
            && !self.interface_name.trim().is_empty()
            && !self.version.trim().is_empty()
    }
}

/// Implemented by agents that advertise capabilities
pub trait CapabilityConfigurationProvider: Send + Sync {
    fn capability_configurations(&self) -> Vec<CapabilityConfiguration>;
}

/// Registration side of the capabilities delegate
pub trait CapabilityRegistry: Send + Sync {
    /// Returns false if any of the provider's configurations is rejected.
    fn register_capability(&self, provider: Arc<dyn CapabilityConfigurationProvider>) -> bool;
}

/// In-memory capabilities delegate keyed by interface name
#[derive(Debug, Default)]
pub struct CapabilitiesDelegate {
    capabilities: DashMap<String, CapabilityConfiguration>,
}

impl CapabilitiesDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, interface_name: &str) -> bool {
        self.capabilities.contains_key(interface_name)
    }

    pub fn registered(&self) -> Vec<CapabilityConfiguration> {
        let mut all: Vec<_> = self.capabilities.iter().map(|e| e.clone()).collect();
        all.sort_by(|a, b| a.interface_name.cmp(&b.interface_name));
        all
    }

    /// Document advertised to the cloud after registration completes
    pub fn capabilities_document(&self) -> Value {
        json!({
            "envelopeVersion": CAPABILITIES_ENVELOPE_VERSION,
            "capabilities": self.registered(),
        })
    }
}

impl CapabilityRegistry for CapabilitiesDelegate {
    fn register_capability(&self, provider: Arc<dyn CapabilityConfigurationProvider>) -> bool {
        let configs = provider.capability_configurations();
        if configs.is_empty() {
            warn!(target: "capabilities_delegate", "Provider has no capability configurations");
            return false;
        }
        if let Some(bad) = configs.iter().find(|c| !c.is_valid()) {
            warn!(target: "capabilities_delegate", interface = %bad.interface_name, "Invalid capability configuration");
            return false;
        }
        let mut claimed = Vec::with_capacity(configs.len());
        for c in configs {
            let name = c.interface_name.clone();
            let version = c.version.clone();
            let inserted = match self.capabilities.entry(name.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(c);
                    true
                }
            };
            if !inserted {
                warn!(target: "capabilities_delegate", interface = %name, "Capability already registered");
                for n in claimed {
                    self.capabilities.remove(&n);
                }
                return false;
            }
            info!(target: "capabilities_delegate", interface = %name, version = %version, "Registering capability");
            claimed.push(name);
        }
        true
    }
}
