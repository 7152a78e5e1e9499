//! Message normalization: strip decoration so equal events get equal messages.
//!
//! Steps run in a fixed order (see [`normalize_message`]); each one is a small pure
//! function so it can be tested alone.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Severity;

static RETRY_DELAY: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(Trying again in )\d+(\s+seconds)").expect("retry pattern"));

static TIME_OFFSET: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\[\d+s:\d+ms:\d+us\]").expect("time offset pattern"));

static TRAILING_LOG_MARKER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)\s*\[log\]$").expect("log marker pattern"));

static SDK_TAGS: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)^(?:\[(?:SDK|Core|DLSS)\]:\s*)+").expect("sdk tag pattern"));

static CALENDAR_STAMP: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\]\s*").expect("calendar stamp pattern")
});

static ASSET_TAGS: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)^(?:\[(?:AssetLog|Compiler)\]\s*)+").expect("asset tag pattern")
});

/// Run every normalization step, in order.
pub fn normalize_message(
  message: &str,
  category: Option<&str>,
  severity: Option<Severity>,
) -> String {
  let mut message = collapse_retry_delay(message);
  message = strip_leading_tags(&message).to_string();
  message = cut_time_offset(&message).to_string();
  if let Some(category) = category {
    message = strip_token_prefix(&message, category).to_string();
  }
  if let Some(severity) = severity {
    message = strip_token_prefix(&message, severity.as_str()).to_string();
  }
  message = strip_trailing_log_marker(&message);
  strip_source_tags(&message)
}

/// "Trying again in 12 seconds" -> "Trying again in x seconds".
pub fn collapse_retry_delay(message: &str) -> String {
  RETRY_DELAY.replace_all(message, "${1}x${2}").into_owned()
}

/// Strip any number of leading `[...]` tags and `error:` / `[error]:` prefixes.
pub fn strip_leading_tags(message: &str) -> &str {
  let mut rest = message;
  loop {
    rest = rest.trim_start();
    if starts_with_ignore_case(rest, "[error]:") {
      rest = &rest["[error]:".len()..];
    } else if rest.starts_with('[') {
      match rest.find(']') {
        Some(end) => rest = &rest[end + 1..],
        None => break,
      }
    } else if starts_with_ignore_case(rest, "error:") {
      rest = &rest["error:".len()..];
    } else {
      break;
    }
  }
  rest
}

/// Drop everything up to and including an engine time-offset block `[1s:20ms:300us]`.
pub fn cut_time_offset(message: &str) -> &str {
  match TIME_OFFSET.find(message) {
    Some(m) => message[m.end()..].trim_start(),
    None => message,
  }
}

/// Strip `token` (or its lowercase form) when it leads the message and is followed
/// by `:` or a space. The message is trimmed either way.
pub fn strip_token_prefix<'a>(message: &'a str, token: &str) -> &'a str {
  if token.is_empty() {
    return message.trim();
  }
  let lowered = token.to_lowercase();
  let rest = message
    .strip_prefix(token)
    .or_else(|| message.strip_prefix(lowered.as_str()));
  match rest {
    Some(rest) if rest.starts_with(':') || rest.starts_with(' ') => {
      rest.trim_start_matches(&[':', ' '][..]).trim_start()
    }
    _ => message.trim(),
  }
}

/// Remove a trailing `[log]` marker, any case.
pub fn strip_trailing_log_marker(message: &str) -> String {
  TRAILING_LOG_MARKER.replace(message, "").trim().to_string()
}

/// Remove known leading source tags and a leading `[YYYY-MM-DD HH:MM:SS]` stamp.
pub fn strip_source_tags(message: &str) -> String {
  let message = SDK_TAGS.replace(message, "");
  let message = CALENDAR_STAMP.replace(&message, "");
  let message = ASSET_TAGS.replace(&message, "");
  message.trim().to_string()
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
  s.get(..prefix.len())
    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
