//! Transcript turn segmentation.
//!
//! Rebuilds clean speaking turns from the noisy caption region: the host
//! page rewrites, extends, truncates and resets the rendered text of the
//! active speaker at will, and the only input is "something changed"
//! followed by a re-read of current state. The segmenter holds the single
//! open turn buffer and decides when a turn is complete.

use tracing::debug;

use super::strategy::SelectorStrategy;
use super::types::{now_iso8601, TranscriptBlock};

/// The currently open speaking turn. At most one exists per session.
#[derive(Debug, Clone)]
pub struct TurnBuffer {
    pub person_name: String,
    pub transcript_text: String,
    /// Captured when the buffer was opened, not when it closes.
    pub timestamp: String,
}

/// What one observation did to the state machine.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StepEffect {
    /// A turn was finalized and appended to the transcript this cycle.
    pub finalized: bool,
    /// Legacy layout only: the speaker's DOM node grew past the threshold
    /// and should be removed so the host page starts a fresh one.
    pub reset_node: bool,
}

/// One transcript observation, already extracted from the DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerObservation {
    NoActiveSpeaker,
    Speaker { name: String, text: String },
}

pub struct TranscriptSegmenter {
    strategy: SelectorStrategy,
    /// Character delta that splits a long same-speaker turn.
    split_threshold: usize,
    self_label: String,
    self_name: String,
    buffer: Option<TurnBuffer>,
    blocks: Vec<TranscriptBlock>,
}

impl TranscriptSegmenter {
    pub fn new(strategy: SelectorStrategy, split_threshold: usize, self_label: &str) -> Self {
        Self {
            strategy,
            split_threshold,
            self_label: self_label.to_string(),
            self_name: self_label.to_string(),
            buffer: None,
            blocks: Vec::new(),
        }
    }

    /// Display name substituted for the host page's self label at block
    /// creation. Defaults to the label itself until captured.
    pub fn set_self_name(&mut self, name: &str) {
        self.self_name = name.to_string();
    }

    pub fn blocks(&self) -> &[TranscriptBlock] {
        &self.blocks
    }

    pub fn current_turn(&self) -> Option<&TurnBuffer> {
        self.buffer.as_ref()
    }

    /// Feed one mutation batch's re-read of the caption region.
    pub fn observe(&mut self, observation: SpeakerObservation) -> StepEffect {
        let mut effect = StepEffect::default();

        match observation {
            SpeakerObservation::NoActiveSpeaker => {
                // Last person stopped speaking and nobody took over.
                debug!("No active transcript");
                if self.close_buffer() {
                    effect.finalized = true;
                }
            }
            SpeakerObservation::Speaker { name, text } => match self.buffer.take() {
                None => {
                    self.buffer = Some(TurnBuffer {
                        person_name: name,
                        transcript_text: text,
                        timestamp: now_iso8601(),
                    });
                }
                Some(open) if open.person_name != name => {
                    // New person started speaking; the previous turn is done.
                    self.push_block(open);
                    effect.finalized = true;
                    self.buffer = Some(TurnBuffer {
                        person_name: name,
                        transcript_text: text,
                        timestamp: now_iso8601(),
                    });
                }
                Some(mut open) => {
                    match self.strategy {
                        SelectorStrategy::AriaRegion => {
                            // A drastically shorter re-read means the host
                            // page silently reset this speaker's node after
                            // a very long turn. Close the long turn before
                            // its text is lost.
                            if open.transcript_text.len() >= text.len()
                                && open.transcript_text.len() - text.len() >= self.split_threshold
                            {
                                let person_name = open.person_name.clone();
                                self.push_block(open);
                                effect.finalized = true;
                                open = TurnBuffer {
                                    person_name,
                                    transcript_text: String::new(),
                                    timestamp: now_iso8601(),
                                };
                            }
                        }
                        SelectorStrategy::LegacyClass => {
                            // The legacy layout drops the leading text of a
                            // long node unpredictably. Removing the node
                            // forces the host page to start a fresh entry,
                            // which the next cycle picks up as a person
                            // change with nothing missed.
                            if text.len() > self.split_threshold {
                                effect.reset_node = true;
                            }
                        }
                    }
                    open.transcript_text = text;
                    self.buffer = Some(open);
                }
            },
        }

        if let Some(buffer) = &self.buffer {
            let text = &buffer.transcript_text;
            if text.chars().count() > 125 {
                let head: String = text.chars().take(50).collect();
                let tail: String = text
                    .chars()
                    .rev()
                    .take(50)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                debug!("{} ... {}", head, tail);
            } else {
                debug!("{}", text);
            }
        }

        effect
    }

    /// Force-close the open turn, if any. Used at session end so an
    /// in-flight turn is never lost.
    pub fn finalize(&mut self) -> bool {
        self.close_buffer()
    }

    fn close_buffer(&mut self) -> bool {
        match self.buffer.take() {
            Some(open) if !open.person_name.is_empty() && !open.transcript_text.is_empty() => {
                self.push_block(open);
                true
            }
            _ => false,
        }
    }

    fn push_block(&mut self, buffer: TurnBuffer) {
        let person_name = if buffer.person_name == self.self_label {
            self.self_name.clone()
        } else {
            buffer.person_name
        };
        self.blocks.push(TranscriptBlock {
            person_name,
            timestamp: buffer.timestamp,
            transcript_text: buffer.transcript_text,
        });
    }
}
