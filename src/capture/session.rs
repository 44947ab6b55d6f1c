//! Session lifecycle orchestration.
//!
//! Waits for the call to actually start, wires the transcript and chat
//! observers, routes mutation batches into the segmenter and chat
//! collector, and guarantees a final flush when the user leaves the call.
//!
//! Everything runs inside one event loop: frame ticks and mutation batches
//! arrive on a single channel and are handled to completion one at a time,
//! so the open turn buffer needs no locking. Failures are caught at each
//! handler boundary and routed through the status reporter; nothing
//! escapes to the caller.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::page::{select_with_text, ElementWaiter, NodeId, PageEvent, PageView, Region};
use crate::store::bridge::{SavedFields, StoreBridge};
use crate::store::keys;

use super::chat::ChatCollector;
use super::segmenter::{SpeakerObservation, TranscriptSegmenter};
use super::status::{FailureKind, Notification, NotificationSurface, StatusReporter};
use super::strategy::{read_last_chat, selectors, ChatRead, RegionRead, SelectorStrategy};
use super::types::{now_iso8601, ChatMessage, SessionMeta, TranscriptBlock};

const READY_MESSAGE: &str =
    "<strong>Meeting capture is running</strong> <br /> Do not turn off captions";
const MANUAL_MODE_MESSAGE: &str =
    "<strong>Meeting capture is in manual mode.</strong> <br /> Turn on captions if you wish to record.";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub self_label: String,
    pub turn_split_chars: usize,
    pub manual_captions: bool,
    /// Frames to let the title element settle before reading it; the host
    /// page fills the real title in well after the element appears.
    pub title_settle_frames: u32,
    /// Frames to wait for the chat panel after clicking its toggle; the
    /// panel opens on the click, so absence past this is a broken page.
    pub chat_panel_frames: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            self_label: "You".to_string(),
            turn_split_chars: 250,
            manual_captions: false,
            title_settle_frames: 60,
            chat_panel_frames: 600,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &crate::config::CaptureConfig) -> Self {
        Self {
            self_label: config.self_label.clone(),
            turn_split_chars: config.turn_split_chars,
            manual_captions: config.manual_captions,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    WaitingForStart,
    Active,
    Ended,
}

enum TranscriptAttach {
    WaitingForCaptionsIcon(ElementWaiter),
    WaitingForRegion,
    Attached,
    Failed,
}

enum ChatAttach {
    WaitingForIcon(ElementWaiter),
    WaitingForPanel {
        waiter: ElementWaiter,
        frames_left: u32,
    },
    Attached,
    Failed,
}

enum TitleCapture {
    Idle,
    Waiting(ElementWaiter),
    Settling { frames_left: u32 },
    Done,
}

pub struct SessionController {
    page: Arc<dyn PageView>,
    bridge: StoreBridge,
    reporter: StatusReporter,
    options: SessionOptions,

    phase: SessionPhase,
    start_waiter: ElementWaiter,
    name_waiter: Option<ElementWaiter>,
    self_name: String,

    meta: SessionMeta,
    title_capture: TitleCapture,

    transcript_attach: TranscriptAttach,
    chat_attach: ChatAttach,
    strategy: Option<SelectorStrategy>,
    segmenter: Option<TranscriptSegmenter>,
    chat: ChatCollector,
}

impl SessionController {
    pub fn new(
        page: Arc<dyn PageView>,
        bridge: StoreBridge,
        surface: Arc<dyn NotificationSurface>,
        options: SessionOptions,
    ) -> Self {
        let chat = ChatCollector::new(&options.self_label);
        let self_name = options.self_label.clone();
        Self {
            page,
            bridge,
            reporter: StatusReporter::new(surface),
            options,
            phase: SessionPhase::WaitingForStart,
            start_waiter: ElementWaiter::with_text(selectors::SYMBOL_ICON, selectors::END_CALL_TEXT),
            name_waiter: Some(ElementWaiter::new(selectors::USER_NAME)),
            self_name,
            meta: SessionMeta {
                meeting_title: String::new(),
                meeting_start_timestamp: String::new(),
            },
            title_capture: TitleCapture::Idle,
            transcript_attach: TranscriptAttach::Failed,
            chat_attach: ChatAttach::Failed,
            strategy: None,
            segmenter: None,
            chat,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn transcript(&self) -> &[TranscriptBlock] {
        self.segmenter.as_ref().map(|s| s.blocks()).unwrap_or(&[])
    }

    pub fn chat_messages(&self) -> &[ChatMessage] {
        self.chat.messages()
    }

    /// Check the stored status record and seed this session's state.
    /// Returns false when capture is administratively disabled.
    pub async fn begin(&mut self) -> bool {
        let status = self
            .bridge
            .store()
            .get(&[keys::CAPTURE_STATUS])
            .ok()
            .and_then(|mut state| state.remove(keys::CAPTURE_STATUS));

        if let Some(record) = &status {
            let code = record["status"].as_u64().unwrap_or(200);
            if code != 200 {
                // Downtime or kill switch: show the stored message and stop.
                let message = record["message"].as_str().unwrap_or("Capture is disabled");
                self.reporter
                    .announce(&Notification {
                        // An out-of-range stored code must not truncate into
                        // the informational 200.
                        status: u16::try_from(code).unwrap_or(400),
                        message: message.to_string(),
                    });
                self.phase = SessionPhase::Ended;
                return false;
            }
        }

        self.meta = SessionMeta {
            meeting_title: self.page.document_title(),
            meeting_start_timestamp: now_iso8601(),
        };

        // Clear the previous session's fields so readers never mix two
        // meetings.
        self.bridge
            .save(
                SavedFields {
                    transcript: Some(&[]),
                    chat_messages: Some(&[]),
                    meeting_title: Some(&self.meta.meeting_title),
                    meeting_start_timestamp: Some(&self.meta.meeting_start_timestamp),
                },
                false,
            )
            .await;

        info!("Waiting for the call to start");
        true
    }

    /// Consume the event channel until it closes. A stream that ends while
    /// the session is active still gets its final flush.
    pub async fn run(&mut self, mut events: mpsc::Receiver<PageEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        if self.phase == SessionPhase::Active {
            debug!("Event stream closed mid-session, finalizing");
            self.end_session().await;
        }
    }

    pub async fn handle_event(&mut self, event: PageEvent) {
        match (self.phase, event) {
            (SessionPhase::WaitingForStart, PageEvent::Frame) => self.poll_for_start().await,
            (SessionPhase::Active, PageEvent::Frame) => self.poll_active().await,
            (SessionPhase::Active, PageEvent::Mutation(Region::Transcript)) => {
                self.on_transcript_mutation().await
            }
            (SessionPhase::Active, PageEvent::Mutation(Region::Chat)) => {
                self.on_chat_mutation().await
            }
            (SessionPhase::Active, PageEvent::EndCallClicked) => self.end_session().await,
            // Anything after the end, and mutations before the start, are
            // noise.
            _ => {}
        }
    }

    async fn poll_for_start(&mut self) {
        self.poll_user_name();

        if let Some(end_icon) = self.start_waiter.poll(self.page.as_ref()) {
            self.enter_active(end_icon).await;
        }
    }

    fn poll_user_name(&mut self) {
        let Some(waiter) = &self.name_waiter else {
            return;
        };
        if let Some(node) = waiter.poll(self.page.as_ref()) {
            // The element renders before its text loads from the network;
            // keep polling until it is non-empty.
            if let Some(name) = self.page.text(node).filter(|t| !t.is_empty()) {
                debug!("Captured display name: {}", name);
                self.self_name = name;
                self.chat.set_self_name(&self.self_name);
                self.name_waiter = None;
            }
        }
    }

    async fn enter_active(&mut self, end_icon: NodeId) {
        info!("Meeting started");
        self.phase = SessionPhase::Active;
        self.name_waiter = None;
        self.bridge.signal_session_started().await;

        // The end-call control's container is what the user actually
        // clicks; losing it means the session can never end cleanly.
        match self
            .page
            .parent(end_icon)
            .and_then(|p| self.page.parent(p))
        {
            Some(container) => self.page.watch_clicks(container),
            None => self.reporter.report(
                FailureKind::EndControlMissing,
                &anyhow::anyhow!("End-call control has no clickable container"),
            ),
        }

        self.title_capture = TitleCapture::Waiting(ElementWaiter::new(selectors::MEETING_TITLE));
        self.transcript_attach = TranscriptAttach::WaitingForCaptionsIcon(
            ElementWaiter::with_text(selectors::SYMBOL_ICON, selectors::CAPTIONS_TEXT),
        );
        self.chat_attach = ChatAttach::WaitingForIcon(ElementWaiter::with_text(
            selectors::SYMBOL_ICON,
            selectors::CHAT_TEXT,
        ));

        if self.options.manual_captions {
            self.reporter
                .announce(&Notification::warning(MANUAL_MODE_MESSAGE));
        } else {
            self.reporter.announce(&Notification::info(READY_MESSAGE));
        }
    }

    async fn poll_active(&mut self) {
        self.step_transcript_attach();
        self.step_chat_attach();
        self.step_title_capture().await;
    }

    fn step_transcript_attach(&mut self) {
        match &self.transcript_attach {
            TranscriptAttach::WaitingForCaptionsIcon(waiter) => {
                if let Some(icon) = waiter.poll(self.page.as_ref()) {
                    if self.options.manual_captions {
                        debug!("Manual mode selected, leaving captions off");
                    } else {
                        self.page.click(icon);
                    }
                    self.transcript_attach = TranscriptAttach::WaitingForRegion;
                }
            }
            TranscriptAttach::WaitingForRegion => {
                // The container is present whether or not captions are on,
                // so attachment is independent of the operation mode.
                let Ok(strategy) = SelectorStrategy::detect(self.page.as_ref()) else {
                    return;
                };
                match strategy.transcript_root(self.page.as_ref()) {
                    Ok(root) => {
                        strategy.dim_transcript(self.page.as_ref(), root);
                        let mut segmenter = TranscriptSegmenter::new(
                            strategy,
                            self.options.turn_split_chars,
                            &self.options.self_label,
                        );
                        segmenter.set_self_name(&self.self_name);
                        self.segmenter = Some(segmenter);
                        self.strategy = Some(strategy);
                        self.page.observe(root, Region::Transcript);
                        info!("Transcript observer attached ({})", strategy.as_str());
                        self.transcript_attach = TranscriptAttach::Attached;
                    }
                    Err(e) => {
                        self.reporter
                            .report(FailureKind::TranscriptRegionMissing, &e);
                        self.transcript_attach = TranscriptAttach::Failed;
                    }
                }
            }
            TranscriptAttach::Attached | TranscriptAttach::Failed => {}
        }
    }

    fn step_chat_attach(&mut self) {
        match &mut self.chat_attach {
            ChatAttach::WaitingForIcon(waiter) => {
                if let Some(icon) = waiter.poll(self.page.as_ref()) {
                    // The message list only exists after the panel has been
                    // opened once; open it to force the node into the page.
                    self.page.click(icon);
                    self.chat_attach = ChatAttach::WaitingForPanel {
                        waiter: ElementWaiter::new(selectors::CHAT_MESSAGES),
                        frames_left: self.options.chat_panel_frames,
                    };
                }
            }
            ChatAttach::WaitingForPanel { waiter, frames_left } => {
                if let Some(panel) = waiter.poll(self.page.as_ref()) {
                    // Close the panel again; the node stays alive once
                    // created. Re-query the icon, the old handle may be
                    // stale.
                    match select_with_text(
                        self.page.as_ref(),
                        selectors::SYMBOL_ICON,
                        selectors::CHAT_TEXT,
                    )
                    .first()
                    {
                        Some(&icon) => self.page.click(icon),
                        None => self.reporter.report(
                            FailureKind::ChatIconMissing,
                            &anyhow::anyhow!("Chat toggle disappeared while opening the panel"),
                        ),
                    }
                    self.page.observe(panel, Region::Chat);
                    info!("Chat observer attached");
                    self.chat_attach = ChatAttach::Attached;
                } else if *frames_left == 0 {
                    self.reporter.report(
                        FailureKind::ChatPanelMissing,
                        &anyhow::anyhow!("Chat panel never appeared after opening it"),
                    );
                    self.chat_attach = ChatAttach::Failed;
                } else {
                    *frames_left -= 1;
                }
            }
            ChatAttach::Attached | ChatAttach::Failed => {}
        }
    }

    async fn step_title_capture(&mut self) {
        match &mut self.title_capture {
            TitleCapture::Idle | TitleCapture::Done => {}
            TitleCapture::Waiting(waiter) => {
                if waiter.poll(self.page.as_ref()).is_some() {
                    self.title_capture = TitleCapture::Settling {
                        frames_left: self.options.title_settle_frames,
                    };
                }
            }
            TitleCapture::Settling { frames_left } => {
                if *frames_left > 0 {
                    *frames_left -= 1;
                    return;
                }
                self.title_capture = TitleCapture::Done;
                let title = self
                    .page
                    .query(selectors::MEETING_TITLE)
                    .and_then(|n| self.page.text(n))
                    .filter(|t| !t.is_empty());
                match title {
                    Some(title) => {
                        info!("Meeting title: {}", title);
                        self.meta.meeting_title = title;
                        self.bridge
                            .save(
                                SavedFields {
                                    meeting_title: Some(&self.meta.meeting_title),
                                    ..Default::default()
                                },
                                false,
                            )
                            .await;
                    }
                    // Non-critical: keep the document title, log only.
                    None => self.reporter.log_only(
                        FailureKind::TitleCapture,
                        &anyhow::anyhow!("Meeting title element never produced text"),
                    ),
                }
            }
        }
    }

    async fn on_transcript_mutation(&mut self) {
        let Some(strategy) = self.strategy else {
            return;
        };
        match strategy.read_transcript(self.page.as_ref()) {
            Err(e) => {
                self.reporter.report(FailureKind::TranscriptParse, &e);
            }
            Ok(RegionRead::Unreadable) => {
                // Transient: carry state over unchanged.
            }
            Ok(read) => {
                let (observation, node) = match read {
                    RegionRead::NoActiveSpeaker => (SpeakerObservation::NoActiveSpeaker, None),
                    RegionRead::Speaker { node, name, text } => {
                        (SpeakerObservation::Speaker { name, text }, Some(node))
                    }
                    RegionRead::Unreadable => unreachable!(),
                };
                let Some(segmenter) = &mut self.segmenter else {
                    return;
                };
                let effect = segmenter.observe(observation);
                if effect.reset_node {
                    if let Some(node) = node {
                        self.page.remove(node);
                    }
                }
                if effect.finalized {
                    let blocks = self.segmenter.as_ref().map(|s| s.blocks()).unwrap_or(&[]);
                    self.bridge
                        .save(
                            SavedFields {
                                transcript: Some(blocks),
                                ..Default::default()
                            },
                            false,
                        )
                        .await;
                }
            }
        }
    }

    async fn on_chat_mutation(&mut self) {
        match read_last_chat(self.page.as_ref()) {
            Err(e) => {
                self.reporter.report(FailureKind::ChatParse, &e);
            }
            Ok(ChatRead::Empty) | Ok(ChatRead::Unreadable) => {}
            Ok(ChatRead::Message { name, text }) => {
                if self.chat.offer(&name, &text) {
                    self.bridge
                        .save(
                            SavedFields {
                                chat_messages: Some(self.chat.messages()),
                                ..Default::default()
                            },
                            false,
                        )
                        .await;
                }
            }
        }
    }

    async fn end_session(&mut self) {
        info!("Meeting ended");
        self.phase = SessionPhase::Ended;
        self.reporter.session_ended();

        self.page.disconnect(Region::Transcript);
        self.page.disconnect(Region::Chat);

        // One or more people may still be mid-turn when the call ends.
        if let Some(segmenter) = &mut self.segmenter {
            segmenter.finalize();
        }

        let blocks = self.segmenter.as_ref().map(|s| s.blocks()).unwrap_or(&[]);
        self.bridge
            .save(
                SavedFields {
                    transcript: Some(blocks),
                    chat_messages: Some(self.chat.messages()),
                    ..Default::default()
                },
                true,
            )
            .await;
    }
}
