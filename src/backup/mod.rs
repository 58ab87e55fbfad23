//! Backup run: retrieve every message, save it, and classify its body.

pub mod report;
pub mod writer;

use std::io::Cursor;

use crate::config::BackupConfig;
use crate::error::{BackupError, Result};
use crate::extract::extract_primary_text;
use crate::model::entity::{Entity, Header};
use crate::parser::content_type::try_parse_content_type;
use crate::parser::header::{display_header_value, parse_date, read_entity};
use crate::pop3::{MessageInfo, MessageSource};

pub use report::{BackupReport, MessageSummary, MessageView, Reporter, TracingReporter};

/// Back up every message `source` lists into `config.mail_dir`.
///
/// A message that cannot be retrieved, saved or parsed is reported and
/// skipped; only listing failures and an unusable `mail_dir` abort the run.
/// `progress` receives `(done, total)` after each message.
pub fn run<S: MessageSource>(
    source: &mut S,
    config: &BackupConfig,
    reporter: &mut dyn Reporter,
    progress: &dyn Fn(usize, usize),
) -> Result<BackupReport> {
    std::fs::create_dir_all(&config.mail_dir)
        .map_err(|e| BackupError::io(&config.mail_dir, e))?;

    let messages = source.list()?;
    let mut report = BackupReport {
        total: messages.len(),
        ..BackupReport::default()
    };
    reporter.info(None, &format!("{} message(s) to back up", report.total));

    for (done, info) in messages.iter().enumerate() {
        match backup_one(source, *info, config, reporter) {
            Ok(summary) => {
                report.saved += 1;
                report.summaries.push(summary);
            }
            Err(e) => {
                reporter.error(Some(info.id), &format!("mail_{} skipped: {e}", info.id));
                report.failed += 1;
            }
        }
        progress(done + 1, report.total);
    }

    Ok(report)
}

fn backup_one<S: MessageSource>(
    source: &mut S,
    info: MessageInfo,
    config: &BackupConfig,
    reporter: &mut dyn Reporter,
) -> Result<MessageSummary> {
    let id = info.id;
    let raw = source.retrieve(id)?;
    let eml_path = writer::write_eml(&config.mail_dir, id, &raw)?;

    let (header, body_offset) = split_message(&raw)?;
    let body = &raw[body_offset..];

    if let Ok(ct) = try_parse_content_type(header.get("content-type").unwrap_or("")) {
        reporter.info(
            Some(id),
            &format!(
                "mail_{id} Content-Type: {}; boundary={}",
                ct.media_type,
                ct.boundary().unwrap_or("")
            ),
        );
    }

    if config.save_raw_body {
        if let Err(e) = writer::write_raw_body(&config.mail_dir, id, body) {
            reporter.warn(Some(id), &format!("mail_{id} raw body not saved: {e}"));
        }
    }

    let extracted = extract_primary_text(Entity::new(header.clone(), Cursor::new(body)));
    for degradation in &extracted.degradations {
        reporter.warn(Some(id), &format!("mail_{id} {degradation}"));
    }
    let tag = extracted.tag();
    reporter.body_result(id, tag);

    let summary = MessageSummary {
        id,
        size: info.size,
        subject: display_header_value(header.get("subject").unwrap_or("")),
        from: display_header_value(header.get("from").unwrap_or("")),
        date: header.get("date").map(|raw| {
            parse_date(raw).map_or_else(|| raw.trim().to_string(), |d| d.to_rfc3339())
        }),
        tag,
        eml_path,
    };

    reporter.view(&MessageView {
        summary: &summary,
        header: &header,
        extracted: &extracted,
    });

    Ok(summary)
}

/// Parse the header block of `raw` and return it with the offset where the
/// body section starts.
fn split_message(raw: &[u8]) -> Result<(Header, usize)> {
    let entity = read_entity(Cursor::new(raw))?;
    let (header, rest) = entity.into_parts();
    let offset = usize::try_from(rest.position()).unwrap_or(raw.len());
    Ok((header, offset.min(raw.len())))
}
