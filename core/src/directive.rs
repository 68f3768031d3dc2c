// Directive routing
use crate::{EngineError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Route key of a directive, e.g. `SpeechSynthesizer.Speak`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceAndName {
    pub namespace: String,
    pub name: String,
}

impl NamespaceAndName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespaceAndName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// An already-structured instruction for a capability agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    #[serde(default)]
    pub dialog_request_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Directive {
    pub fn key(&self) -> NamespaceAndName {
        NamespaceAndName::new(self.namespace.clone(), self.name.clone())
    }
}

/// Implemented by capability agents that receive directives
#[async_trait]
pub trait DirectiveHandler: Send + Sync {
    /// Directives this handler claims
    fn configuration(&self) -> Vec<NamespaceAndName>;

    async fn handle_directive(&self, directive: Directive) -> Result<()>;

    fn cancel_directive(&self, message_id: &str);
}

/// Registration side of the directive sequencer
pub trait DirectiveDispatcher: Send + Sync {
    /// Returns false if the handler could not be registered.
    fn add_directive_handler(&self, handler: Arc<dyn DirectiveHandler>) -> bool;

    fn remove_directive_handler(&self, handler: &Arc<dyn DirectiveHandler>) -> bool;
}

fn same_handler(a: &Arc<dyn DirectiveHandler>, b: &Arc<dyn DirectiveHandler>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// In-memory directive sequencer: one handler per namespace/name
#[derive(Default)]
pub struct DirectiveSequencer {
    routes: DashMap<NamespaceAndName, Arc<dyn DirectiveHandler>>,
    shut_down: AtomicBool,
}

impl DirectiveSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a directive to the handler that owns its namespace/name
    #[tracing::instrument(skip(self, directive), fields(directive = %directive.key(), message_id = %directive.message_id))]
    pub async fn dispatch(&self, directive: Directive) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::ShutDown);
        }
        let key = directive.key();
        // Clone out so the map guard isn't held across the await
        let handler = self
            .routes
            .get(&key)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| EngineError::HandlerNotFound {
                namespace: key.namespace.clone(),
                name: key.name.clone(),
            })?;
        debug!(target: "directive_sequencer", directive = %key, "Dispatching directive");
        handler.handle_directive(directive).await
    }

    /// Number of distinct registered handlers
    pub fn handler_count(&self) -> usize {
        let mut seen: Vec<Arc<dyn DirectiveHandler>> = Vec::new();
        for e in self.routes.iter() {
            if !seen.iter().any(|h| same_handler(h, e.value())) {
                seen.push(Arc::clone(e.value()));
            }
        }
        seen.len()
    }

    pub fn routes(&self) -> Vec<NamespaceAndName> {
        let mut keys: Vec<_> = self.routes.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn shutdown(&self) {
        info!(target: "directive_sequencer", "Directive sequencer shutting down");
        self.shut_down.store(true, Ordering::SeqCst);
        self.routes.clear();
    }
}

impl DirectiveDispatcher for DirectiveSequencer {
    fn add_directive_handler(&self, handler: Arc<dyn DirectiveHandler>) -> bool {
        if self.shut_down.load(Ordering::SeqCst) {
            warn!(target: "directive_sequencer", "add_directive_handler after shutdown");
            return false;
        }
        let config = handler.configuration();
        if config.is_empty() {
            warn!(target: "directive_sequencer", "Handler declares no directives");
            return false;
        }
        let mut claimed = Vec::with_capacity(config.len());
        for key in config {
            let inserted = match self.routes.entry(key.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&handler));
                    true
                }
            };
            if !inserted {
                warn!(target: "directive_sequencer", directive = %key, "Directive already has a handler");
                // A rejected handler keeps none of its routes
                for k in claimed {
                    self.routes.remove(&k);
                }
                return false;
            }
            info!(target: "directive_sequencer", directive = %key, "Registering directive handler");
            claimed.push(key);
        }
        true
    }

    fn remove_directive_handler(&self, handler: &Arc<dyn DirectiveHandler>) -> bool {
        let before = self.routes.len();
        self.routes.retain(|_, h| !same_handler(h, handler));
        before != self.routes.len()
    }
}
