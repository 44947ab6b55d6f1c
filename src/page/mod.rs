//! Boundary to the host conferencing page.
//!
//! The capture engine never talks to a real DOM directly. It sees the page
//! through [`PageView`]: opaque node handles, selector queries and a small
//! set of interactions. The embedder (a browser shell, or [`scripted`] in
//! tests and replays) implements the trait and feeds [`PageEvent`]s into the
//! session controller's channel.
//!
//! Mutation events carry no payload on purpose. The handlers re-read the
//! current rendered state on every tick, which keeps the segmenter correct
//! under observer coalescing and arbitrary host-page rewrites.

pub mod scripted;
pub mod waiter;

pub use waiter::ElementWaiter;

/// Opaque handle to a rendered node. Valid only until the host page detaches
/// the node; holders must re-query rather than cache across events.
pub type NodeId = u64;

/// The two observed subtrees of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Transcript,
    Chat,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::Chat => "chat",
        }
    }
}

/// Events delivered by the embedder, in page order. The session controller
/// consumes them from a single channel, so handlers never run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// One rendering frame elapsed. Drives element waiters.
    Frame,
    /// Something changed under an observed region. The payload is the region
    /// only; handlers re-read the DOM.
    Mutation(Region),
    /// The user clicked the watched end-call container.
    EndCallClicked,
}

/// Read/interact surface over the host page.
///
/// `query*` take CSS-ish selector strings that are opaque to the engine;
/// the embedder decides how to match them. Detached nodes yield `None`s.
pub trait PageView: Send + Sync {
    /// First attached node matching the selector, document order.
    fn query(&self, selector: &str) -> Option<NodeId>;
    /// All attached nodes matching the selector, document order.
    fn query_all(&self, selector: &str) -> Vec<NodeId>;
    /// Rendered text content of a node (own text plus descendants).
    fn text(&self, node: NodeId) -> Option<String>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    /// Detach a node from the page (mode-B long-turn reset).
    fn remove(&self, node: NodeId);
    fn click(&self, node: NodeId);
    fn set_style(&self, node: NodeId, css: &str);
    fn document_title(&self) -> String;
    /// Start delivering `Mutation(region)` events for changes under `node`.
    fn observe(&self, node: NodeId, region: Region);
    /// Stop delivering events for the region. Unconditional and immediate.
    fn disconnect(&self, region: Region);
    /// Start delivering `EndCallClicked` for clicks inside `node`.
    fn watch_clicks(&self, node: NodeId);
}

/// Nth child of a node, if present.
pub fn child(page: &dyn PageView, node: NodeId, index: usize) -> Option<NodeId> {
    page.children(node).get(index).copied()
}

/// All elements of the selector whose text content equals `text` exactly.
pub fn select_with_text(page: &dyn PageView, selector: &str, text: &str) -> Vec<NodeId> {
    page.query_all(selector)
        .into_iter()
        .filter(|&node| page.text(node).as_deref() == Some(text))
        .collect()
}
