//! Action scheduler - orders extracted actions and trims incomplete code

use crate::core::{
    action::{FileAction, FileType},
    config::TruncationPolicy,
};
use std::borrow::Cow;
use tracing::debug;

/// Text that identifies a truncation marker line
const MARKER_TAG: &str = "lines omitted from incomplete draft]";

/// Orders actions and applies the truncation policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionScheduler {
    policy: TruncationPolicy,
}

impl ActionScheduler {
    pub fn new(policy: TruncationPolicy) -> Self {
        Self { policy }
    }

    /// Sort and truncate
    ///
    /// Order: documentation before code, then ascending priority, then
    /// complete before incomplete. The sort is stable, so ties keep the
    /// order the model listed them in.
    pub fn schedule(&self, mut actions: Vec<FileAction>) -> Vec<FileAction> {
        actions.sort_by_key(sort_key);

        for action in &mut actions {
            if action.file_type != FileType::Code || action.is_complete {
                continue;
            }
            if let Cow::Owned(trimmed) = truncate_content(&action.content, &self.policy) {
                debug!(
                    "Truncated incomplete draft {} from {} to {} bytes",
                    action.path,
                    action.content.len(),
                    trimmed.len()
                );
                action.content = trimmed;
            }
        }

        actions
    }
}

fn sort_key(action: &FileAction) -> (u8, u8, u8) {
    let type_rank = match action.file_type {
        FileType::Documentation => 0,
        FileType::Code => 1,
    };
    (type_rank, action.priority, u8::from(!action.is_complete))
}

/// Keep the head and tail of oversized content, replacing the middle with a marker
///
/// Content at or under either limit, or already carrying a marker, is
/// returned unchanged.
pub fn truncate_content<'a>(content: &'a str, policy: &TruncationPolicy) -> Cow<'a, str> {
    if content.chars().count() <= policy.threshold_chars || content.contains(MARKER_TAG) {
        return Cow::Borrowed(content);
    }

    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= policy.min_lines || lines.len() <= policy.head_lines + policy.tail_lines + 1 {
        return Cow::Borrowed(content);
    }

    let tail_start = lines.len() - policy.tail_lines;
    let omitted = tail_start - policy.head_lines;

    let mut out = Vec::with_capacity(policy.head_lines + policy.tail_lines + 1);
    out.extend_from_slice(&lines[..policy.head_lines]);
    let marker = format!("... [{} {}", omitted, MARKER_TAG);
    out.push(marker.as_str());
    out.extend_from_slice(&lines[tail_start..]);

    let mut joined = out.join("\n");
    if content.ends_with('\n') {
        joined.push('\n');
    }
    Cow::Owned(joined)
}
