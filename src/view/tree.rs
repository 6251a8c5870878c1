use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use crate::sync::RefreshSink;
use crate::tags::{TagColor, TagRegistry};

/// Node of the tags sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagNode {
    /// Top-level group for one color, labelled `"<name> (<count>)"`.
    Group { color: TagColor, label: String },
    Folder { path: String, name: String },
    File { path: String, name: String },
}

impl TagNode {
    pub fn label(&self) -> &str {
        match self {
            TagNode::Group { label, .. } => label.as_str(),
            TagNode::Folder { name, .. } | TagNode::File { name, .. } => name.as_str(),
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            TagNode::Group { .. } => None,
            TagNode::Folder { path, .. } | TagNode::File { path, .. } => Some(path.as_str()),
        }
    }

    pub fn is_expandable(&self) -> bool {
        !matches!(self, TagNode::File { .. })
    }

    fn for_path(path: String) -> Self {
        let name = file_name(&path);
        // A path that no longer exists is shown as a file until the next sweep.
        let is_dir = std::fs::metadata(&path)
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if is_dir {
            TagNode::Folder { path, name }
        } else {
            TagNode::File { path, name }
        }
    }
}

/// Last path component, or the whole path when there is none.
pub fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Sidebar model: tags grouped by color, folders expandable into their
/// current contents.
pub struct TagTree {
    registry: Arc<TagRegistry>,
    refreshed: watch::Sender<u64>,
}

impl TagTree {
    pub fn new(registry: Arc<TagRegistry>) -> Self {
        let (refreshed, _) = watch::channel(0);
        Self {
            registry,
            refreshed,
        }
    }

    /// Receives the refresh count each time the view should re-render.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.refreshed.subscribe()
    }

    pub fn refresh_count(&self) -> u64 {
        *self.refreshed.borrow()
    }

    pub fn roots(&self) -> Vec<TagNode> {
        self.registry
            .used_colors()
            .into_iter()
            .map(|color| {
                let count = self.registry.paths_for_color(color).len();
                TagNode::Group {
                    color,
                    label: format!("{} ({})", self.registry.display_name(color), count),
                }
            })
            .collect()
    }

    pub fn children(&self, node: &TagNode) -> Vec<TagNode> {
        match node {
            TagNode::Group { color, .. } => self
                .registry
                .paths_for_color(*color)
                .into_iter()
                .map(TagNode::for_path)
                .collect(),
            TagNode::Folder { path, .. } => folder_contents(path),
            TagNode::File { .. } => Vec::new(),
        }
    }
}

impl RefreshSink for TagTree {
    fn refresh(&self) {
        self.refreshed.send_modify(|count| *count += 1);
    }
}

fn folder_contents(folder: &str) -> Vec<TagNode> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(%folder, error = %e, "failed to read folder");
            return Vec::new();
        }
    };

    let mut nodes: Vec<TagNode> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| TagNode::for_path(entry.path().to_string_lossy().into_owned()))
        .collect();

    nodes.sort_by(|a, b| match (a, b) {
        (TagNode::Folder { .. }, TagNode::File { .. }) => Ordering::Less,
        (TagNode::File { .. }, TagNode::Folder { .. }) => Ordering::Greater,
        _ => a.label().cmp(b.label()),
    });
    nodes
}
