//! Frame-paced element polling.

use super::{select_with_text, NodeId, PageView};

/// Waits for the first element matching a selector (optionally with exact
/// text) to appear. Polled once per rendering frame by the caller, which
/// keeps the search synchronized with the host page's paint cycle instead
/// of a wall-clock timer.
///
/// A waiter never times out on its own; absence is always "not yet". The
/// returned handle is good for one use — callers re-query afterwards since
/// the host page may detach and replace the node at any time.
#[derive(Debug, Clone)]
pub struct ElementWaiter {
    selector: String,
    text: Option<String>,
}

impl ElementWaiter {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: None,
        }
    }

    pub fn with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: Some(text.into()),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// One poll. `Some` on the first match, `None` while absent.
    pub fn poll(&self, page: &dyn PageView) -> Option<NodeId> {
        match &self.text {
            Some(text) => select_with_text(page, &self.selector, text)
                .into_iter()
                .next(),
            None => page.query(&self.selector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::scripted::ScriptedPage;

    #[test]
    fn test_poll_absent_then_present() {
        let page = ScriptedPage::new();
        let waiter = ElementWaiter::new(".join-button");

        assert!(waiter.poll(&page).is_none());

        let node = page.add_node(None, &[".join-button"], Some("Join"));
        assert_eq!(waiter.poll(&page), Some(node));
    }

    #[test]
    fn test_text_match_is_exact() {
        let page = ScriptedPage::new();
        page.add_node(None, &[".icon"], Some("call_end_other"));
        let icon = page.add_node(None, &[".icon"], Some("call_end"));

        let waiter = ElementWaiter::with_text(".icon", "call_end");
        assert_eq!(waiter.poll(&page), Some(icon));
    }

    #[test]
    fn test_detached_match_is_not_returned() {
        let page = ScriptedPage::new();
        let node = page.add_node(None, &[".banner"], Some("hi"));
        page.remove(node);

        let waiter = ElementWaiter::new(".banner");
        assert!(waiter.poll(&page).is_none());
    }

    #[test]
    fn test_first_match_in_document_order() {
        let page = ScriptedPage::new();
        let first = page.add_node(None, &[".entry"], Some("a"));
        page.add_node(None, &[".entry"], Some("b"));

        let waiter = ElementWaiter::new(".entry");
        assert_eq!(waiter.poll(&page), Some(first));
    }
}
