//! Integration tests for the log engine.

use std::fs;

use log_engine::{parse, parse_file, LogParser, Severity};

fn fixture_log() -> &'static str {
  "[2024.01.01-00.00.00:001][  0]LogInit: Display: Running engine for game: Demo
[2024.01.01-00.00.01:123][  0]LogTemp: Error: Something broke
[2024.01.01-00.00.02:456][  0]LogTemp: Warning: Minor issue
[2024.01.01-00.00.03:000][  0]LogHttp: Warning: Request failed. Trying again in 5 seconds
[2024.01.01-00.00.09:000][  0]LogHttp: Warning: Request failed. Trying again in 30 seconds
[2024.01.01-00.00.10:000][  0]LogInit: Display: Warning/Error Summary (Unique only)
[2024.01.01-00.00.10:000][  0]LogInit: Display: NOTE: Only first 50 warnings displayed.
Traceback (most recent call last):
  at Game.Tick()
  at Game.Run()

[2024.01.01-00.00.11:000][  0]LogWindows: Error: === Critical error: ===
[2024.01.01-00.00.11:000][  0]LogWindows: Error: Fatal error!
[2024.01.01-00.00.11:000][  0]LogWindows: Error: Unhandled Exception: EXCEPTION_ACCESS_VIOLATION
[2024.01.01-00.00.11:000][  0]LogWindows: Error: [Callstack] 0x00007ff Core.dll!Crash()
[2024.01.01-00.00.12:000][  0]LogExit: Executing StaticShutdownAfterError
"
}

#[test]
fn two_line_scenario() {
  let text = "[2024.01.01-00.00.01:123]LogTemp: Error: Something broke\n[2024.01.01-00.00.02:456]LogTemp: Warning: Minor issue";
  let entries = parse(text.lines(), "game.log");
  assert_eq!(entries.len(), 2);

  assert_eq!(entries[0].severity, Severity::Error);
  assert_eq!(entries[0].category.as_deref(), Some("LogTemp"));
  assert_eq!(entries[0].message, "Something broke");
  assert!(entries[0].event_hash.is_some());

  assert_eq!(entries[1].severity, Severity::Warning);
  assert_eq!(entries[1].category.as_deref(), Some("LogTemp"));
  assert_eq!(entries[1].message, "Minor issue");
  assert!(entries[1].event_hash.is_none());
}

#[test]
fn traceback_scenario() {
  let text = "Traceback (most recent call last):\n  at foo()\n  at bar()\n\n";
  let entries = parse(text.lines(), "game.log");
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].severity, Severity::Error);
  assert_eq!(entries[0].traceback.len(), 3);
  assert_eq!(entries[0].line_number, 1);
}

#[test]
fn retry_messages_share_hash() {
  let entries = parse(
    ["LogNet: Warning: Trying again in 5 seconds", "LogNet: Warning: Trying again in 30 seconds"],
    "game.log",
  );
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0].message, "Trying again in x seconds");
  assert_eq!(entries[0].message, entries[1].message);
  assert_eq!(entries[0].message_hash, entries[1].message_hash);
}

#[test]
fn identities_are_stable_across_parses() {
  let a = parse(fixture_log().lines(), "/uploads/game.log");
  let b = parse(fixture_log().lines(), "other/dir/game.log");
  assert_eq!(a.len(), b.len());
  for (x, y) in a.iter().zip(&b) {
    assert_eq!(x.line_entry_id, y.line_entry_id);
    assert_eq!(x.message_hash, y.message_hash);
    assert_eq!(x.event_hash, y.event_hash);
    let ids_x: Vec<_> = x.traceback.iter().map(|l| &l.line_entry_id).collect();
    let ids_y: Vec<_> = y.traceback.iter().map(|l| &l.line_entry_id).collect();
    assert_eq!(ids_x, ids_y);
  }
}

#[test]
fn noise_only_input_yields_nothing() {
  let text = "LogInit: Display: Warning/Error Summary (Unique only)
LogInit: Display: NOTE: Only first 50 warnings displayed.
To disable this warning set bWarn=false
LogOnline: Display: Login successful";
  assert!(parse(text.lines(), "noise.log").is_empty());
}

#[test]
fn fixture_entries_in_file_order() {
  let entries = parse(fixture_log().lines(), "game.log");
  let summary: Vec<_> = entries
    .iter()
    .map(|e| (e.line_number, e.severity, e.traceback.len()))
    .collect();
  assert_eq!(
    summary,
    vec![
      (2, Severity::Error, 0),
      (3, Severity::Warning, 0),
      (4, Severity::Warning, 0),
      (5, Severity::Warning, 0),
      (8, Severity::Error, 3),
      (12, Severity::Error, 5),
    ]
  );
  assert_eq!(entries[4].message, "at Game.Run()");
  assert_eq!(entries[5].message, "=== Critical error: ===");
  assert_eq!(entries[3].message_hash, entries[2].message_hash);
}

#[test]
fn traceback_entries_are_errors_anchored_at_first_line() {
  for entry in parse(fixture_log().lines(), "game.log") {
    if entry.has_traceback() {
      assert_eq!(entry.severity, Severity::Error);
      assert_eq!(entry.traceback[0].line_number, entry.line_number);
      let numbers: Vec<_> = entry.traceback.iter().map(|l| l.line_number).collect();
      let mut sorted = numbers.clone();
      sorted.sort_unstable();
      assert_eq!(numbers, sorted);
    }
  }
}

#[test]
fn separator_grace_window_keeps_one_block() {
  let text = "CommandletException: Cook failed
  at Cook.Package()
==========
Cooked 120 packages
Elapsed 3.2s
  at Cook.Main()
";
  let entries = parse(text.lines(), "cook.log");
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].traceback.len(), 6);
  assert_eq!(entries[0].message, "at Cook.Main()");
}

#[test]
fn eof_mid_traceback_is_flushed() {
  let text = "Traceback (most recent call last):\n  at a()\n  at b()\nValueException: error while loading";
  let entries = parse(text.lines(), "t.log");
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].traceback.len(), 4);
  assert_eq!(entries[0].category.as_deref(), Some("ValueException"));
}

#[test]
fn entries_serialize_to_json() {
  let entries = parse(fixture_log().lines(), "game.log");
  let json = serde_json::to_value(&entries[4]).unwrap();
  assert_eq!(json["severity"], "Error");
  assert_eq!(json["traceback"].as_array().unwrap().len(), 3);
  assert!(json["traceback"][0]["timestamp"].is_null());
  let first = serde_json::to_value(&entries[0]).unwrap();
  assert_eq!(first["timestamp"], "2024-01-01T00:00:01");
}

#[test]
fn parse_file_reads_from_disk() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("game.log");
  fs::write(&path, fixture_log()).unwrap();

  let entries = parse_file(&path).unwrap();
  assert_eq!(entries.len(), 6);
  assert!(entries
    .iter()
    .flat_map(|e| &e.traceback)
    .all(|line| line.filename == "game.log"));
}

#[test]
fn parse_file_tolerates_invalid_utf8() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("bin.log");
  fs::write(&path, b"LogTemp: Error: bad byte \xff here\n").unwrap();

  let entries = LogParser::with_defaults().parse_file(&path).unwrap();
  assert_eq!(entries.len(), 1);
  assert!(entries[0].message.starts_with("bad byte"));
}

#[test]
fn unreadable_path_is_an_error() {
  let dir = tempfile::tempdir().unwrap();
  let err = parse_file(dir.path()).unwrap_err();
  assert!(err.to_string().contains("io"));
}
