//! UI Theme - colors and icons shared by terminal output

use crossterm::style::Color;

/// Default theme for terminal output
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ColorScheme,
    pub icons: Icons,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ColorScheme::default(),
            icons: Icons::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Public names (primary content)
    pub name: Color,
    /// Local paths and secondary info
    pub secondary: Color,
    /// Section headers
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            name: Color::Cyan,
            secondary: Color::DarkGrey,
            header: Color::White,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Icons {
    /// Queued or planned (○)
    pub pending: &'static str,
    /// In flight (●)
    pub active: &'static str,
    /// Done (✓)
    pub success: &'static str,
    /// Failed (✗)
    pub error: &'static str,
    /// Non-fatal problem (⚠)
    pub warning: &'static str,
    /// Info (ℹ)
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            pending: "○",
            active: "●",
            success: "✓",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
        }
    }
}

/// Shorten `s` to at most `max` characters, keeping the end.
pub fn truncate_start(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max || max < 2 {
        return s.to_string();
    }
    let tail: String = s.chars().skip(count - (max - 1)).collect();
    format!("…{tail}")
}
