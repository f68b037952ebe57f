//! Explicit registry of source descriptors.
//!
//! Replaces a process-wide cache of configured sources: the registry is a
//! plain object built by the caller, passed by reference, and dropped with
//! the harvest session.

use std::collections::HashSet;

use crate::error::HarvestError;
use crate::models::SourceDescriptor;

/// Insertion-ordered, id-unique set of sources for one session.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
    ids: HashSet<String>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: SourceDescriptor) -> Result<(), HarvestError> {
        if !self.ids.insert(source.id.clone()) {
            return Err(HarvestError::InvalidRequest(format!(
                "duplicate source id: {}",
                source.id
            )));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// All descriptors in registration order.
    pub fn descriptors(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Resolve a subset by id, preserving the requested order.
    pub fn select(&self, ids: &[String]) -> Result<Vec<SourceDescriptor>, HarvestError> {
        ids.iter()
            .map(|id| {
                self.get(id).cloned().ok_or_else(|| {
                    HarvestError::InvalidRequest(format!("unknown source id: {id}"))
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMethod, WorkerSpec};

    fn source(id: &str) -> SourceDescriptor {
        SourceDescriptor {
            id: id.into(),
            display_name: id.to_uppercase(),
            worker: WorkerSpec {
                program: "true".into(),
                args: vec![],
            },
            extraction: ExtractionMethod::PatternSplit,
            timeout_secs: 30,
            start_delay_ms: 0,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = SourceRegistry::new();
        reg.register(source("pew")).unwrap();
        reg.register(source("siena")).unwrap();
        assert_eq!(reg.len(), 2);
        assert!(reg.get("pew").is_some());
        assert!(reg.get("gallup").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut reg = SourceRegistry::new();
        reg.register(source("pew")).unwrap();
        assert!(matches!(
            reg.register(source("pew")),
            Err(HarvestError::InvalidRequest(_))
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_select_preserves_order_and_errors_on_unknown() {
        let mut reg = SourceRegistry::new();
        reg.register(source("pew")).unwrap();
        reg.register(source("siena")).unwrap();

        let picked = reg
            .select(&["siena".to_string(), "pew".to_string()])
            .unwrap();
        assert_eq!(picked[0].id, "siena");
        assert_eq!(picked[1].id, "pew");

        assert!(reg.select(&["gallup".to_string()]).is_err());
    }
}
