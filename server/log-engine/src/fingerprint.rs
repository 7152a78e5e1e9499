//! Content-addressed identities used for de-duplication and idempotent indexing.
//!
//! - `message_hash`: blake3 of the normalized message.
//! - `event_hash`: blake3 of the message followed by every traceback message.
//! - `line_entry_id`: SHA-1 of a canonical JSON description of one physical line,
//!   truncated to 15 bytes and encoded as unpadded URL-safe base64.

use std::io;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::NaiveDateTime;
use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::types::LineRecord;

/// Bytes of the SHA-1 digest kept in a line id (20 base64 characters).
const LINE_ID_BYTES: usize = 15;

/// Stable hex hash of a normalized message.
pub fn message_hash(message: &str) -> String {
  blake3::hash(message.as_bytes()).to_hex().to_string()
}

/// Hash over the headline message and the traceback messages, in order.
///
/// Two errors sharing a headline but differing in call stack get different hashes.
pub fn event_hash(message: &str, traceback: &[LineRecord]) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(message.as_bytes());
  for line in traceback {
    hasher.update(line.message.as_bytes());
  }
  hasher.finalize().to_hex().to_string()
}

/// Canonical description of one physical line. Field order is the sorted key order.
#[derive(Serialize)]
struct LinePosition<'a> {
  datetime: Option<String>,
  filename: &'a str,
  line: &'a str,
  line_number: usize,
}

/// Stable identifier of one physical line of one file.
///
/// Re-parsing the same file yields the same id for the same line.
pub fn line_entry_id(
  timestamp: Option<&NaiveDateTime>,
  filename: &str,
  line_number: usize,
  line: &str,
) -> String {
  let position = LinePosition {
    datetime: timestamp.map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
    filename,
    line,
    line_number,
  };

  let mut payload = Vec::with_capacity(line.len() + filename.len() + 64);
  let mut ser = serde_json::Serializer::with_formatter(&mut payload, AsciiFormatter);
  position
    .serialize(&mut ser)
    .expect("strings and integers always serialize into a Vec");

  let digest = Sha1::digest(&payload);
  URL_SAFE_NO_PAD.encode(&digest[..LINE_ID_BYTES])
}

/// Compact JSON that escapes everything outside printable ASCII as `\uXXXX`.
struct AsciiFormatter;

impl serde_json::ser::Formatter for AsciiFormatter {
  fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
  where
    W: ?Sized + io::Write,
  {
    let mut start = 0;
    for (idx, ch) in fragment.char_indices() {
      if (' '..='~').contains(&ch) {
        continue;
      }
      writer.write_all(fragment[start..idx].as_bytes())?;
      let mut units = [0u16; 2];
      for unit in ch.encode_utf16(&mut units) {
        write!(writer, "\\u{:04x}", unit)?;
      }
      start = idx + ch.len_utf8();
    }
    writer.write_all(fragment[start..].as_bytes())
  }
}
