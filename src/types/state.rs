//! Focus state definitions

use serde::{Deserialize, Serialize};

/// Focus states of a DRR session.
///
/// Focus 12 → 15 → 21 are metric-driven; the CRL states are
/// operator-selected training modes outside the DRR loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusState {
    /// Session start, waiting for sustained stability
    #[serde(rename = "FOCUS_12")]
    Focus12,
    /// Entered through the time-collapse event
    #[serde(rename = "FOCUS_15")]
    Focus15,
    /// Deep state gated by coherence, convergence and long dwell
    #[serde(rename = "FOCUS_21")]
    Focus21,
    /// Training: tactical
    #[serde(rename = "CRL_T")]
    CrlTactical,
    /// Training: memory
    #[serde(rename = "CRL_M")]
    CrlMemory,
    /// Training: performance
    #[serde(rename = "CRL_P")]
    CrlPerformance,
}

impl FocusState {
    /// Training modes bypass metric-driven transitions
    pub fn is_training(&self) -> bool {
        matches!(
            self,
            FocusState::CrlTactical | FocusState::CrlMemory | FocusState::CrlPerformance
        )
    }

    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            FocusState::Focus12 => "\x1b[36m",   // Cyan
            FocusState::Focus15 => "\x1b[35m",   // Magenta
            FocusState::Focus21 => "\x1b[33m",   // Gold
            _ => "\x1b[90m",                     // Gray
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            FocusState::Focus12 => "◐",
            FocusState::Focus15 => "◑",
            FocusState::Focus21 => "●",
            _ => "◇",
        }
    }
}

impl std::fmt::Display for FocusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FocusState::Focus12 => "Focus 12",
            FocusState::Focus15 => "Focus 15",
            FocusState::Focus21 => "Focus 21",
            FocusState::CrlTactical => "CRL-T",
            FocusState::CrlMemory => "CRL-M",
            FocusState::CrlPerformance => "CRL-P",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for FocusState {
    type Err = String;

    /// Accepts "Focus 21", "focus21", "f21", "21", "CRL-T", "crlt", "FOCUS_15", ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let key = key.trim_start_matches("focus").trim_start_matches('f');
        match key {
            "12" => Ok(FocusState::Focus12),
            "15" => Ok(FocusState::Focus15),
            "21" => Ok(FocusState::Focus21),
            "crlt" => Ok(FocusState::CrlTactical),
            "crlm" => Ok(FocusState::CrlMemory),
            "crlp" => Ok(FocusState::CrlPerformance),
            _ => Err(format!("unknown focus state: {}", s)),
        }
    }
}
