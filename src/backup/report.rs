//! What a backup run tells its caller: log-worthy events through a
//! [`Reporter`], and a [`BackupReport`] at the end.

use std::path::PathBuf;

use serde::Serialize;

use crate::model::entity::Header;
use crate::model::extraction::{BodyTag, Extracted};

/// Receives the events of a backup run.
///
/// The library never prints; the binary decides what reaches the
/// terminal or the log file. Messages arrive fully formatted as
/// `mail_<id> ...`; `id` is `None` for run-level events.
pub trait Reporter {
    fn info(&mut self, id: Option<u32>, message: &str);
    fn warn(&mut self, id: Option<u32>, message: &str);
    fn error(&mut self, id: Option<u32>, message: &str);

    /// The body tag chosen for message `id`.
    fn body_result(&mut self, id: u32, tag: BodyTag) {
        self.info(Some(id), &format!("mail_{id} body result: {tag}"));
    }

    /// Called once per processed message, after extraction.
    fn view(&mut self, _view: &MessageView<'_>) {}
}

/// Forwards every event to `tracing`, with the message id (and tag, for
/// body results) as fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&mut self, id: Option<u32>, message: &str) {
        match id {
            Some(id) => tracing::info!(mail_id = id, "{message}"),
            None => tracing::info!("{message}"),
        }
    }

    fn warn(&mut self, id: Option<u32>, message: &str) {
        match id {
            Some(id) => tracing::warn!(mail_id = id, "{message}"),
            None => tracing::warn!("{message}"),
        }
    }

    fn error(&mut self, id: Option<u32>, message: &str) {
        match id {
            Some(id) => tracing::error!(mail_id = id, "{message}"),
            None => tracing::error!("{message}"),
        }
    }

    fn body_result(&mut self, id: u32, tag: BodyTag) {
        tracing::info!(mail_id = id, tag = tag.as_str(), "mail_{id} body result: {tag}");
    }
}

/// A processed message, as handed to [`Reporter::view`].
pub struct MessageView<'a> {
    pub summary: &'a MessageSummary,
    pub header: &'a Header,
    pub extracted: &'a Extracted,
}

/// One saved message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub id: u32,
    /// Size reported by the server's LIST reply.
    pub size: u64,
    /// Decoded for display.
    pub subject: String,
    /// Decoded for display.
    pub from: String,
    /// RFC 3339 when the Date header parses, otherwise the raw value.
    pub date: Option<String>,
    pub tag: BodyTag,
    pub eml_path: PathBuf,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupReport {
    /// Messages listed by the server.
    pub total: usize,
    /// Messages written and classified.
    pub saved: usize,
    /// Messages skipped because of an error.
    pub failed: usize,
    pub summaries: Vec<MessageSummary>,
}

impl BackupReport {
    /// Count of saved messages per tag, in tag order.
    pub fn tag_counts(&self) -> Vec<(BodyTag, usize)> {
        BodyTag::ALL
            .iter()
            .map(|&tag| (tag, self.summaries.iter().filter(|s| s.tag == tag).count()))
            .filter(|&(_, count)| count > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u32, tag: BodyTag) -> MessageSummary {
        MessageSummary {
            id,
            size: 10,
            subject: String::new(),
            from: String::new(),
            date: None,
            tag,
            eml_path: PathBuf::from(format!("mail_{id}.eml")),
        }
    }

    #[test]
    fn test_tag_counts_skip_absent_tags() {
        let report = BackupReport {
            total: 3,
            saved: 3,
            failed: 0,
            summaries: vec![
                summary(1, BodyTag::Plain),
                summary(2, BodyTag::Html),
                summary(3, BodyTag::Plain),
            ],
        };
        let counts = report.tag_counts();
        assert_eq!(counts.len(), 2);
        assert!(counts.contains(&(BodyTag::Plain, 2)));
        assert!(counts.contains(&(BodyTag::Html, 1)));
    }

    #[test]
    fn test_summary_serializes_tag_name() {
        let json = serde_json::to_value(summary(1, BodyTag::ImgOnly)).expect("serialize");
        assert_eq!(json["tag"], "IMG-ONLY");
        assert_eq!(json["eml_path"], "mail_1.eml");
    }
}
