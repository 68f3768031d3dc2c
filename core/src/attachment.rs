use dashmap::DashMap;
use tracing::debug;

/// Source of binary directive attachments (e.g. speech audio)
pub trait AttachmentManager: Send + Sync {
    fn read(&self, attachment_id: &str) -> Option<Vec<u8>>;
}

/// Attachment id referenced by a `cid:` url
pub fn content_id(url: &str) -> Option<&str> {
    url.strip_prefix("cid:").filter(|id| !id.is_empty())
}

#[derive(Debug, Default)]
pub struct InMemoryAttachmentManager {
    attachments: DashMap<String, Vec<u8>>,
}

impl InMemoryAttachmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, attachment_id: impl Into<String>, data: Vec<u8>) {
        let id = attachment_id.into();
        debug!(target: "attachment_manager", attachment_id = %id, bytes = data.len(), "Attachment stored");
        self.attachments.insert(id, data);
    }

    pub fn remove(&self, attachment_id: &str) -> Option<Vec<u8>> {
        self.attachments.remove(attachment_id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}

impl AttachmentManager for InMemoryAttachmentManager {
    fn read(&self, attachment_id: &str) -> Option<Vec<u8>> {
        self.attachments.get(attachment_id).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_strips_prefix() {
        assert_eq!(content_id("cid:abc"), Some("abc"));
        assert_eq!(content_id("cid:"), None);
        assert_eq!(content_id("https://example.com/a.mp3"), None);
    }
}
