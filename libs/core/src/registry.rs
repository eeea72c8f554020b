//! Process-wide slot holding the vendor entry point and its settings blob.
//!
//! The slot is shared with code outside this crate: an externally loaded vendor
//! script may populate or replace it at any time, so readers never assume they own it.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::props::RawSettings;
use crate::vendor::SharedEntryPoint;

pub trait VendorHandleRegistry: Send + Sync {
    fn entry_point(&self) -> Option<SharedEntryPoint>;
    fn set_entry_point(&self, entry_point: SharedEntryPoint);
    fn settings(&self) -> Option<RawSettings>;
    fn set_settings(&self, settings: RawSettings);
    /// Drops both the entry point and the settings blob.
    fn clear(&self);

    fn is_loaded(&self) -> bool {
        self.entry_point().is_some()
    }
}

pub type SharedRegistry = Arc<dyn VendorHandleRegistry>;

#[derive(Default)]
struct Slot {
    entry_point: Option<SharedEntryPoint>,
    settings: Option<RawSettings>,
}

#[derive(Default)]
pub struct MemoryRegistry {
    slot: RwLock<Slot>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Self::new())
    }
}

impl VendorHandleRegistry for MemoryRegistry {
    fn entry_point(&self) -> Option<SharedEntryPoint> {
        match self.slot.read() {
            Ok(slot) => slot.entry_point.clone(),
            Err(poisoned) => poisoned.into_inner().entry_point.clone(),
        }
    }

    fn set_entry_point(&self, entry_point: SharedEntryPoint) {
        match self.slot.write() {
            Ok(mut slot) => slot.entry_point = Some(entry_point),
            Err(poisoned) => poisoned.into_inner().entry_point = Some(entry_point),
        }
    }

    fn settings(&self) -> Option<RawSettings> {
        match self.slot.read() {
            Ok(slot) => slot.settings.clone(),
            Err(poisoned) => poisoned.into_inner().settings.clone(),
        }
    }

    fn set_settings(&self, settings: RawSettings) {
        match self.slot.write() {
            Ok(mut slot) => slot.settings = Some(settings),
            Err(poisoned) => poisoned.into_inner().settings = Some(settings),
        }
    }

    fn clear(&self) {
        match self.slot.write() {
            Ok(mut slot) => *slot = Slot::default(),
            Err(poisoned) => *poisoned.into_inner() = Slot::default(),
        }
    }
}

static GLOBAL: Lazy<SharedRegistry> = Lazy::new(MemoryRegistry::shared);

/// The registry shared by every provider in the process unless one is injected.
pub fn global_registry() -> SharedRegistry {
    GLOBAL.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::StubEntryPoint;
    use serde_json::json;

    #[test]
    fn set_and_clear_round_trip() {
        let registry = MemoryRegistry::new();
        assert!(!registry.is_loaded());
        assert!(registry.settings().is_none());

        registry.set_entry_point(Arc::new(StubEntryPoint::new()));
        let mut settings = RawSettings::new();
        settings.insert("app_id".into(), json!("abc"));
        registry.set_settings(settings.clone());

        assert!(registry.is_loaded());
        assert_eq!(registry.settings(), Some(settings));

        registry.clear();
        assert!(!registry.is_loaded());
        assert!(registry.settings().is_none());
    }

    #[test]
    fn global_registry_is_shared() {
        let a = global_registry();
        let b = global_registry();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
