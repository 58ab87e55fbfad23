//! Files written for each backed-up message.
//!
//! `mail_<id>.eml` holds the message exactly as retrieved.
//! `mail_<id>_rawbody.txt` holds the undecoded body section, i.e. every
//! byte after the blank line that ends the header block.

use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};

/// Suffix that marks raw-body dumps, so scans can skip them.
pub const RAW_BODY_SUFFIX: &str = "_rawbody.txt";

/// `mail_<id>.eml`
pub fn eml_filename(id: u32) -> String {
    format!("mail_{id}.eml")
}

/// `mail_<id>_rawbody.txt`
pub fn raw_body_filename(id: u32) -> String {
    format!("mail_{id}{RAW_BODY_SUFFIX}")
}

/// Write the raw message bytes and return the file path.
pub fn write_eml(dir: &Path, id: u32, raw: &[u8]) -> Result<PathBuf> {
    let path = dir.join(eml_filename(id));
    std::fs::write(&path, raw).map_err(|e| BackupError::io(&path, e))?;
    Ok(path)
}

/// Write the body section and return the file path.
pub fn write_raw_body(dir: &Path, id: u32, body: &[u8]) -> Result<PathBuf> {
    let path = dir.join(raw_body_filename(id));
    std::fs::write(&path, body).map_err(|e| BackupError::io(&path, e))?;
    Ok(path)
}

/// `true` for `*.eml` files that are message backups, not body dumps.
pub fn is_message_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        && !name.ends_with(RAW_BODY_SUFFIX)
}
