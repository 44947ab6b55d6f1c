//! Selector strategies for the two DOM shapes the host page ships.
//!
//! The aria-region layout is the current one; the class-based layout is the
//! older shape that some rollouts still render. Which one is present is
//! feature-detected once at session start and injected into the session, so
//! the rest of the engine never branches on page structure ad hoc.

use anyhow::{bail, Result};

use crate::page::{child, NodeId, PageView};

/// Anchor selectors of the host page.
pub mod selectors {
    /// Caption region, current layout. Present once captions have rendered.
    pub const TRANSCRIPT_REGION: &str = r#"div[role="region"][tabindex="0"]"#;
    /// Caption container, legacy layout.
    pub const TRANSCRIPT_LEGACY: &str = ".a4cQT";
    /// Chat message list. Appears after the chat panel is opened once.
    pub const CHAT_MESSAGES: &str = r#"div[aria-live="polite"].Ge9Kpc"#;
    /// Icon font class carrying the control glyphs.
    pub const SYMBOL_ICON: &str = ".google-symbols";
    /// Glyph text of the end-call control.
    pub const END_CALL_TEXT: &str = "call_end";
    /// Glyph text of the captions toggle.
    pub const CAPTIONS_TEXT: &str = "closed_caption_off";
    /// Glyph text of the chat panel toggle.
    pub const CHAT_TEXT: &str = "chat";
    /// Local user's display name in the pre-join screen.
    pub const USER_NAME: &str = ".awLEm";
    /// Meeting title, revealed a while after join.
    pub const MEETING_TITLE: &str = ".u6vdEc";
}

/// What one transcript mutation batch sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionRead {
    /// People list below the meaningful minimum: nobody is speaking.
    NoActiveSpeaker,
    /// The most recent active speaker entry.
    Speaker {
        node: NodeId,
        name: String,
        text: String,
    },
    /// Entry present but name or text unreadable this cycle. Ignored.
    Unreadable,
}

/// What one chat mutation batch sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRead {
    Empty,
    Message { name: String, text: String },
    Unreadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorStrategy {
    /// Structural, aria-based layout.
    AriaRegion,
    /// Legacy class-based layout.
    LegacyClass,
}

impl SelectorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AriaRegion => "aria-region",
            Self::LegacyClass => "legacy-class",
        }
    }

    /// Feature-detect which layout the page renders. Resolved once at
    /// session start.
    pub fn detect(page: &dyn PageView) -> Result<Self> {
        if page.query(selectors::TRANSCRIPT_REGION).is_some() {
            return Ok(Self::AriaRegion);
        }
        if page.query(selectors::TRANSCRIPT_LEGACY).is_some() {
            return Ok(Self::LegacyClass);
        }
        bail!("No known transcript container present in the page")
    }

    /// Root node the transcript observer attaches to.
    pub fn transcript_root(&self, page: &dyn PageView) -> Result<NodeId> {
        let selector = match self {
            Self::AriaRegion => selectors::TRANSCRIPT_REGION,
            Self::LegacyClass => selectors::TRANSCRIPT_LEGACY,
        };
        match page.query(selector) {
            Some(node) => Ok(node),
            None => bail!("Transcript element not found in page"),
        }
    }

    /// Dim the rendered captions so they do not distract during capture.
    pub fn dim_transcript(&self, page: &dyn PageView, root: NodeId) {
        match self {
            Self::AriaRegion => page.set_style(root, "opacity:0.2"),
            Self::LegacyClass => {
                if let Some(inner) = child(page, root, 1) {
                    page.set_style(inner, "opacity:0.2");
                }
            }
        }
    }

    /// Re-read the current people list and extract the latest speaker.
    /// `Err` means the region itself is gone — structural breakage, not a
    /// transient parse miss.
    pub fn read_transcript(&self, page: &dyn PageView) -> Result<RegionRead> {
        let people = match self {
            Self::AriaRegion => {
                let root = self.transcript_root(page)?;
                page.children(root)
            }
            Self::LegacyClass => {
                let root = self.transcript_root(page)?;
                // root -> second child -> first child holds the person list
                child(page, root, 1)
                    .and_then(|n| child(page, n, 0))
                    .map(|n| page.children(n))
                    .unwrap_or_default()
            }
        };

        // The aria layout keeps a trailing "jump to bottom" button in the
        // list, so one element means no speakers.
        let person = match self {
            Self::AriaRegion => {
                if people.len() <= 1 {
                    return Ok(RegionRead::NoActiveSpeaker);
                }
                people[people.len() - 2]
            }
            Self::LegacyClass => match people.last() {
                Some(&node) => node,
                None => return Ok(RegionRead::NoActiveSpeaker),
            },
        };

        let name = child(page, person, 0).and_then(|n| page.text(n));
        let text = child(page, person, 1).and_then(|n| page.text(n));
        match (name, text) {
            (Some(name), Some(text)) if !name.is_empty() && !text.is_empty() => {
                Ok(RegionRead::Speaker {
                    node: person,
                    name,
                    text,
                })
            }
            _ => Ok(RegionRead::Unreadable),
        }
    }
}

/// Re-read the last chat entry. Layout is shared by both strategies.
pub fn read_last_chat(page: &dyn PageView) -> Result<ChatRead> {
    let root = match page.query(selectors::CHAT_MESSAGES) {
        Some(node) => node,
        None => bail!("Chat messages element not found in page"),
    };

    let entries = page.children(root);
    let Some(&last) = entries.last() else {
        return Ok(ChatRead::Empty);
    };

    // Sender sits at first/first, message text at last/last. The text node
    // can carry trailing button noise; the collector strips it.
    let name = child(page, last, 0)
        .and_then(|n| child(page, n, 0))
        .and_then(|n| page.text(n));
    let text = page
        .children(last)
        .last()
        .copied()
        .and_then(|n| page.children(n).last().copied())
        .and_then(|n| page.text(n));

    match (name, text) {
        (Some(name), Some(text)) if !name.is_empty() && !text.is_empty() => {
            Ok(ChatRead::Message { name, text })
        }
        _ => Ok(ChatRead::Unreadable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::scripted::ScriptedPage;

    fn aria_page() -> (ScriptedPage, NodeId) {
        let page = ScriptedPage::new();
        let root = page.add_node(None, &[selectors::TRANSCRIPT_REGION], None);
        (page, root)
    }

    fn add_person(page: &ScriptedPage, root: NodeId, name: &str, text: &str) -> NodeId {
        let person = page.add_node(Some(root), &[], None);
        page.add_node(Some(person), &[], Some(name));
        page.add_node(Some(person), &[], Some(text));
        person
    }

    #[test]
    fn test_detect_prefers_aria() {
        let (page, _) = aria_page();
        page.add_node(None, &[selectors::TRANSCRIPT_LEGACY], None);
        assert_eq!(
            SelectorStrategy::detect(&page).unwrap(),
            SelectorStrategy::AriaRegion
        );
    }

    #[test]
    fn test_detect_falls_back_to_legacy() {
        let page = ScriptedPage::new();
        page.add_node(None, &[selectors::TRANSCRIPT_LEGACY], None);
        assert_eq!(
            SelectorStrategy::detect(&page).unwrap(),
            SelectorStrategy::LegacyClass
        );
    }

    #[test]
    fn test_detect_fails_without_container() {
        let page = ScriptedPage::new();
        assert!(SelectorStrategy::detect(&page).is_err());
    }

    #[test]
    fn test_aria_trailing_button_means_no_speaker() {
        let (page, root) = aria_page();
        // Only the "jump to bottom" button present
        page.add_node(Some(root), &[], Some("Jump to bottom"));
        assert_eq!(
            SelectorStrategy::AriaRegion.read_transcript(&page).unwrap(),
            RegionRead::NoActiveSpeaker
        );
    }

    #[test]
    fn test_aria_reads_entry_before_trailing_button() {
        let (page, root) = aria_page();
        add_person(&page, root, "Alice", "hello there");
        let person = add_person(&page, root, "Bob", "latest words");
        page.add_node(Some(root), &[], Some("Jump to bottom"));

        let read = SelectorStrategy::AriaRegion.read_transcript(&page).unwrap();
        assert_eq!(
            read,
            RegionRead::Speaker {
                node: person,
                name: "Bob".to_string(),
                text: "latest words".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_text_is_unreadable() {
        let (page, root) = aria_page();
        let person = page.add_node(Some(root), &[], None);
        page.add_node(Some(person), &[], Some("Alice"));
        // no text child yet
        page.add_node(Some(root), &[], Some("Jump to bottom"));

        assert_eq!(
            SelectorStrategy::AriaRegion.read_transcript(&page).unwrap(),
            RegionRead::Unreadable
        );
    }

    #[test]
    fn test_region_gone_is_structural_error() {
        let (page, root) = aria_page();
        page.remove(root);
        assert!(SelectorStrategy::AriaRegion.read_transcript(&page).is_err());
    }

    #[test]
    fn test_legacy_reads_last_person() {
        let page = ScriptedPage::new();
        let root = page.add_node(None, &[selectors::TRANSCRIPT_LEGACY], None);
        page.add_node(Some(root), &[], None); // children[0], unused
        let wrap = page.add_node(Some(root), &[], None);
        let list = page.add_node(Some(wrap), &[], None);
        add_person(&page, list, "Alice", "first");
        let person = add_person(&page, list, "Bob", "second");

        let read = SelectorStrategy::LegacyClass
            .read_transcript(&page)
            .unwrap();
        assert_eq!(
            read,
            RegionRead::Speaker {
                node: person,
                name: "Bob".to_string(),
                text: "second".to_string(),
            }
        );
    }

    #[test]
    fn test_chat_reads_last_entry() {
        let page = ScriptedPage::new();
        let root = page.add_node(None, &[selectors::CHAT_MESSAGES], None);
        for (who, what) in [("Alice", "first message"), ("Bob", "second message")] {
            let entry = page.add_node(Some(root), &[], None);
            let header = page.add_node(Some(entry), &[], None);
            page.add_node(Some(header), &[], Some(who));
            let body = page.add_node(Some(entry), &[], None);
            page.add_node(Some(body), &[], Some(what));
        }

        assert_eq!(
            read_last_chat(&page).unwrap(),
            ChatRead::Message {
                name: "Bob".to_string(),
                text: "second message".to_string(),
            }
        );
    }

    #[test]
    fn test_chat_without_entries_is_empty() {
        let page = ScriptedPage::new();
        page.add_node(None, &[selectors::CHAT_MESSAGES], None);
        assert_eq!(read_last_chat(&page).unwrap(), ChatRead::Empty);
    }

    #[test]
    fn test_chat_panel_gone_is_structural_error() {
        let page = ScriptedPage::new();
        assert!(read_last_chat(&page).is_err());
    }
}
