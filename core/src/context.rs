use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::directive::NamespaceAndName;

/// Receives component state that is attached to outbound events
pub trait ContextManager: Send + Sync {
    fn set_state(&self, namespace: &str, name: &str, state: Value) -> bool;
}

/// In-memory context store
#[derive(Debug, Default)]
pub struct InMemoryContextManager {
    states: DashMap<NamespaceAndName, Value>,
}

impl InMemoryContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_state(&self, namespace: &str, name: &str) -> Option<Value> {
        self.states
            .get(&NamespaceAndName::new(namespace, name))
            .map(|e| e.value().clone())
    }

    /// Full context in the shape attached to events
    pub fn context(&self) -> Value {
        let mut keys: Vec<_> = self.states.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        let entries: Vec<Value> = keys
            .into_iter()
            .filter_map(|k| {
                self.states.get(&k).map(|v| {
                    json!({
                        "header": { "namespace": k.namespace, "name": k.name },
                        "payload": v.value().clone(),
                    })
                })
            })
            .collect();
        json!({ "context": entries })
    }
}

impl ContextManager for InMemoryContextManager {
    fn set_state(&self, namespace: &str, name: &str, state: Value) -> bool {
        if namespace.trim().is_empty() || name.trim().is_empty() {
            warn!(target: "context_manager", "Rejected state with empty namespace or name");
            return false;
        }
        debug!(target: "context_manager", namespace = %namespace, name = %name, "State updated");
        self.states.insert(NamespaceAndName::new(namespace, name), state);
        true
    }
}
