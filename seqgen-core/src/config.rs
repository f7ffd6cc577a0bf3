//! Generation and layout configuration

use serde::Deserialize;

/// Generation configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Enable thread numbers, spawning, active objects and broadcasts
    pub multi_thread: bool,
    /// Every call must be answered by an explicit return
    pub explicit_returns: bool,
    /// Vertical space consumed by one arrow
    pub row_height: f64,
    /// Vertical space reserved for a structural marker (note, fragment line)
    pub marker_height: f64,
    /// Height of the participant head box
    pub head_height: f64,
    /// Width of a root activation
    pub main_width: f64,
    /// Horizontal offset per nesting level
    pub sub_width: f64,
    /// Space left of the first lifeline
    pub left_margin: f64,
    /// Minimum space between neighbouring lifelines
    pub lifeline_gap: f64,
    /// Estimated width of one label character
    pub glyph_width: f64,
    /// Padding added around arrow labels
    pub label_padding: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            multi_thread: false,
            explicit_returns: false,
            row_height: 20.0,
            marker_height: 24.0,
            head_height: 32.0,
            main_width: 10.0,
            sub_width: 6.0,
            left_margin: 15.0,
            lifeline_gap: 40.0,
            glyph_width: 7.0,
            label_padding: 12.0,
        }
    }
}

impl Config {
    /// Enable or disable multi-threading
    pub fn with_multi_thread(mut self, multi_thread: bool) -> Self {
        self.multi_thread = multi_thread;
        self
    }

    /// Require explicit returns
    pub fn with_explicit_returns(mut self, explicit_returns: bool) -> Self {
        self.explicit_returns = explicit_returns;
        self
    }

    /// Set the per-level nesting offset
    pub fn with_sub_width(mut self, sub_width: f64) -> Self {
        self.sub_width = sub_width;
        self
    }

    /// Set the minimum lifeline distance
    pub fn with_lifeline_gap(mut self, lifeline_gap: f64) -> Self {
        self.lifeline_gap = lifeline_gap;
        self
    }

    /// Estimated rendered width of a label
    pub fn label_width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.glyph_width + self.label_padding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"multiThread": true}"#).unwrap();
        assert!(config.multi_thread);
        assert_eq!(config.row_height, Config::default().row_height);
    }

    #[test]
    fn test_label_width() {
        let config = Config::default();
        assert_eq!(config.label_width(""), config.label_padding);
        assert_eq!(config.label_width("ab"), 2.0 * config.glyph_width + config.label_padding);
    }
}
