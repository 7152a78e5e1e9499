//! Parser configuration with sane defaults.

/// Substrings marking lines that never carry an event (summary banners, login notices).
pub const DEFAULT_NOISE_MARKERS: [&str; 4] = [
  "Display: Warning/Error Summary (Unique only)",
  "Display: NOTE: Only first 50 warnings displayed.",
  "To disable this warning set",
  "Login successful",
];

/// Tunables for classification and traceback grouping.
#[derive(Debug, Clone)]
pub struct Config {
  /// Non-matching lines still accepted into a traceback block after a separator line.
  pub separator_grace: u8,
  /// A line containing any of these substrings is dropped before classification.
  pub noise_markers: Vec<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      separator_grace: 2,
      noise_markers: DEFAULT_NOISE_MARKERS.iter().map(|m| m.to_string()).collect(),
    }
  }
}
