//! In-memory page backed by a step script.
//!
//! [`ScriptedPage`] is a [`PageView`] over a mutable node tree. It backs the
//! `meetcap replay` command and the engine tests: a recorded session is a
//! sequence of [`ScriptStep`]s that mutate the tree and emit page events in
//! the order the host page produced them.
//!
//! Mutation events are explicit script steps rather than derived from tree
//! edits. That mirrors real observer behavior, where several edits coalesce
//! into one callback and the handler must re-read current state.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::{NodeId, PageEvent, PageView, Region};

#[derive(Debug, Default)]
struct NodeState {
    selectors: Vec<String>,
    text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    removed: bool,
    style: Option<String>,
}

#[derive(Debug, Default)]
struct PageState {
    nodes: Vec<NodeState>,
    observed: HashMap<Region, NodeId>,
    click_watch: Option<NodeId>,
    clicks: Vec<NodeId>,
    title: String,
}

impl PageState {
    fn attached(&self, node: NodeId) -> bool {
        let mut current = node as usize;
        loop {
            let Some(state) = self.nodes.get(current) else {
                return false;
            };
            if state.removed {
                return false;
            }
            match state.parent {
                Some(parent) => current = parent as usize,
                None => return true,
            }
        }
    }

    fn text_of(&self, node: NodeId) -> Option<String> {
        let state = self.nodes.get(node as usize)?;
        if let Some(text) = &state.text {
            return Some(text.clone());
        }
        let mut combined = String::new();
        for &c in &state.children {
            if self.attached(c) {
                if let Some(t) = self.text_of(c) {
                    combined.push_str(&t);
                }
            }
        }
        Some(combined)
    }
}

/// Scriptable in-memory page. Node ids are assigned in creation order, which
/// doubles as document order for queries.
#[derive(Default)]
pub struct ScriptedPage {
    inner: Mutex<PageState>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        let page = Self::new();
        page.inner.lock().unwrap().title = title.into();
        page
    }

    pub fn add_node(
        &self,
        parent: Option<NodeId>,
        selectors: &[&str],
        text: Option<&str>,
    ) -> NodeId {
        let mut state = self.inner.lock().unwrap();
        let id = state.nodes.len() as NodeId;
        state.nodes.push(NodeState {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            text: text.map(|t| t.to_string()),
            parent,
            ..Default::default()
        });
        if let Some(parent) = parent {
            if let Some(parent_state) = state.nodes.get_mut(parent as usize) {
                parent_state.children.push(id);
            }
        }
        id
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) {
        let mut state = self.inner.lock().unwrap();
        if let Some(node_state) = state.nodes.get_mut(node as usize) {
            node_state.text = Some(text.into());
        }
    }

    /// Clicks delivered through [`PageView::click`], in order.
    pub fn clicks(&self) -> Vec<NodeId> {
        self.inner.lock().unwrap().clicks.clone()
    }

    pub fn is_observed(&self, region: Region) -> bool {
        self.inner.lock().unwrap().observed.contains_key(&region)
    }

    pub fn is_click_watched(&self) -> bool {
        self.inner.lock().unwrap().click_watch.is_some()
    }

    pub fn style_of(&self, node: NodeId) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get(node as usize)
            .and_then(|n| n.style.clone())
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.inner.lock().unwrap().attached(node)
    }
}

impl PageView for ScriptedPage {
    fn query(&self, selector: &str) -> Option<NodeId> {
        self.query_all(selector).into_iter().next()
    }

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        let state = self.inner.lock().unwrap();
        (0..state.nodes.len() as NodeId)
            .filter(|&id| {
                state.attached(id)
                    && state.nodes[id as usize]
                        .selectors
                        .iter()
                        .any(|s| s == selector)
            })
            .collect()
    }

    fn text(&self, node: NodeId) -> Option<String> {
        let state = self.inner.lock().unwrap();
        if !state.attached(node) {
            return None;
        }
        state.text_of(node)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        let state = self.inner.lock().unwrap();
        state
            .nodes
            .get(node as usize)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|&c| state.attached(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get(node as usize)
            .and_then(|n| n.parent)
    }

    fn remove(&self, node: NodeId) {
        let mut state = self.inner.lock().unwrap();
        if let Some(node_state) = state.nodes.get_mut(node as usize) {
            node_state.removed = true;
        }
    }

    fn click(&self, node: NodeId) {
        self.inner.lock().unwrap().clicks.push(node);
    }

    fn set_style(&self, node: NodeId, css: &str) {
        let mut state = self.inner.lock().unwrap();
        if let Some(node_state) = state.nodes.get_mut(node as usize) {
            node_state.style = Some(css.to_string());
        }
    }

    fn document_title(&self) -> String {
        self.inner.lock().unwrap().title.clone()
    }

    fn observe(&self, node: NodeId, region: Region) {
        self.inner.lock().unwrap().observed.insert(region, node);
    }

    fn disconnect(&self, region: Region) {
        self.inner.lock().unwrap().observed.remove(&region);
    }

    fn watch_clicks(&self, node: NodeId) {
        self.inner.lock().unwrap().click_watch = Some(node);
    }
}

/// Region name as used in script files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptRegion {
    Transcript,
    Chat,
}

impl From<ScriptRegion> for Region {
    fn from(value: ScriptRegion) -> Self {
        match value {
            ScriptRegion::Transcript => Region::Transcript,
            ScriptRegion::Chat => Region::Chat,
        }
    }
}

/// One recorded page step. Node references are script-local string names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    AddNode {
        name: String,
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        selectors: Vec<String>,
        #[serde(default)]
        text: Option<String>,
    },
    SetText {
        name: String,
        text: String,
    },
    RemoveNode {
        name: String,
    },
    /// Emit `count` rendering-frame events.
    Frames {
        count: u32,
    },
    /// Fire one mutation batch for the region, if it is observed.
    Mutate {
        region: ScriptRegion,
    },
    /// The user clicks the end-call container.
    ClickEndCall,
}

/// A recorded page session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub title: String,
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script file {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse script file")
    }
}

/// Applies script steps to the page, emitting the page events each step
/// produces. The caller feeds the events to the session controller in
/// lockstep, which keeps replays deterministic.
pub struct ScriptDriver<'a> {
    page: &'a ScriptedPage,
    names: HashMap<String, NodeId>,
}

impl<'a> ScriptDriver<'a> {
    pub fn new(page: &'a ScriptedPage) -> Self {
        Self {
            page,
            names: HashMap::new(),
        }
    }

    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Apply one step. Returns the events the embedder would deliver for it.
    pub fn apply(&mut self, step: &ScriptStep) -> Result<Vec<PageEvent>> {
        match step {
            ScriptStep::AddNode {
                name,
                parent,
                selectors,
                text,
            } => {
                let parent = match parent {
                    Some(p) => Some(self.lookup(p)?),
                    None => None,
                };
                let selectors: Vec<&str> = selectors.iter().map(|s| s.as_str()).collect();
                let id = self.page.add_node(parent, &selectors, text.as_deref());
                self.names.insert(name.clone(), id);
                Ok(vec![])
            }
            ScriptStep::SetText { name, text } => {
                let id = self.lookup(name)?;
                self.page.set_text(id, text.clone());
                Ok(vec![])
            }
            ScriptStep::RemoveNode { name } => {
                let id = self.lookup(name)?;
                self.page.remove(id);
                Ok(vec![])
            }
            ScriptStep::Frames { count } => Ok(vec![PageEvent::Frame; *count as usize]),
            ScriptStep::Mutate { region } => {
                let region = Region::from(*region);
                if self.page.is_observed(region) {
                    Ok(vec![PageEvent::Mutation(region)])
                } else {
                    Ok(vec![])
                }
            }
            ScriptStep::ClickEndCall => {
                if self.page.is_click_watched() {
                    Ok(vec![PageEvent::EndCallClicked])
                } else {
                    Ok(vec![])
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<NodeId> {
        match self.names.get(name) {
            Some(&id) => Ok(id),
            None => bail!("Script references unknown node {:?}", name),
        }
    }
}
