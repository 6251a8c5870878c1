use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::tags::{TagColor, TagRegistry};

pub const BADGE: &str = "●";

/// Explorer badge for a tagged entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDecoration {
    pub badge: &'static str,
    pub color: TagColor,
    pub theme_color: &'static str,
    pub tooltip: String,
}

pub struct DecorationProvider {
    registry: Arc<TagRegistry>,
    enabled: AtomicBool,
}

impl DecorationProvider {
    pub fn new(registry: Arc<TagRegistry>, enabled: bool) -> Self {
        Self {
            registry,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn decoration(&self, path: &str) -> Option<FileDecoration> {
        if !self.is_enabled() {
            return None;
        }
        let color = self.registry.get_tag(path)?;
        Some(FileDecoration {
            badge: BADGE,
            color,
            theme_color: color.theme_color(),
            tooltip: format!("Tag: {}", self.registry.display_name(color)),
        })
    }
}
