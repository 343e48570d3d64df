//! Status and theme palettes.
//!
//! Each of the two themes maps the four task statuses to a fixed palette.
//! Palettes pair a light tint with a dark shade of the same hue; the dark
//! theme swaps them, so text contrast stays above the WCAG AA threshold in
//! both themes.

use std::fmt;
use std::str::FromStr;

use flowdesk_core::node::NodeStyle;
use flowdesk_core::task::TaskStatus;
use serde::{Deserialize, Serialize};

use crate::error::ViewError;

/// Active colour theme. Always passed explicitly to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(ViewError::UnknownTheme(other.to_string())),
        }
    }
}

/// Fixed colours for one (status, theme) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub border: &'static str,
}

impl Palette {
    pub fn to_style(self) -> NodeStyle {
        NodeStyle {
            background: Some(self.background.to_string()),
            border: Some(self.border.to_string()),
            text: Some(self.text.to_string()),
        }
    }
}

/// Palette for nodes with no task, or whose task is gone.
pub fn neutral_palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            background: "#FFFFFF",
            text: "#111827",
            border: "#D1D5DB",
        },
        Theme::Dark => Palette {
            background: "#1F2937",
            text: "#F9FAFB",
            border: "#4B5563",
        },
    }
}

pub fn status_palette(status: TaskStatus, theme: Theme) -> Palette {
    use TaskStatus::*;
    match (theme, status) {
        (Theme::Light, Pending) => Palette {
            background: "#FEF3C7",
            text: "#78350F",
            border: "#F59E0B",
        },
        (Theme::Light, InProgress) => Palette {
            background: "#DBEAFE",
            text: "#1E3A8A",
            border: "#3B82F6",
        },
        (Theme::Light, Completed) => Palette {
            background: "#DCFCE7",
            text: "#14532D",
            border: "#22C55E",
        },
        (Theme::Light, Paused) => Palette {
            background: "#F3F4F6",
            text: "#374151",
            border: "#9CA3AF",
        },
        (Theme::Dark, Pending) => Palette {
            background: "#78350F",
            text: "#FEF3C7",
            border: "#FBBF24",
        },
        (Theme::Dark, InProgress) => Palette {
            background: "#1E3A8A",
            text: "#DBEAFE",
            border: "#60A5FA",
        },
        (Theme::Dark, Completed) => Palette {
            background: "#14532D",
            text: "#DCFCE7",
            border: "#4ADE80",
        },
        (Theme::Dark, Paused) => Palette {
            background: "#374151",
            text: "#F3F4F6",
            border: "#6B7280",
        },
    }
}

/// The base style implied by a task status under a theme.
pub fn base_style_for_status(status: TaskStatus, theme: Theme) -> NodeStyle {
    status_palette(status, theme).to_style()
}

pub fn neutral_style(theme: Theme) -> NodeStyle {
    neutral_palette(theme).to_style()
}

/// Overlays a node's custom style on a base style. Custom fields win.
pub fn merge_custom(base: NodeStyle, custom: Option<&NodeStyle>) -> NodeStyle {
    let Some(custom) = custom else {
        return base;
    };
    NodeStyle {
        background: custom.background.clone().or(base.background),
        border: custom.border.clone().or(base.border),
        text: custom.text.clone().or(base.text),
    }
}

fn parse_hex(color: &str) -> Option<[u8; 3]> {
    let hex = color.strip_prefix('#')?;
    // Byte slicing below needs single-byte chars.
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn relative_luminance([r, g, b]: [u8; 3]) -> f64 {
    let linear = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

/// WCAG contrast ratio between two `#RRGGBB` colours, or `None` if either
/// does not parse.
pub fn contrast_ratio(foreground: &str, background: &str) -> Option<f64> {
    let fg = relative_luminance(parse_hex(foreground)?);
    let bg = relative_luminance(parse_hex(background)?);
    let (light, dark) = if fg > bg { (fg, bg) } else { (bg, fg) };
    Some((light + 0.05) / (dark + 0.05))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_palette_has_readable_text() {
        for theme in Theme::ALL {
            let neutral = neutral_palette(theme);
            assert!(contrast_ratio(neutral.text, neutral.background).unwrap() >= 4.5);
            for status in TaskStatus::ALL {
                let p = status_palette(status, theme);
                let ratio = contrast_ratio(p.text, p.background).unwrap();
                assert!(ratio >= 4.5, "{:?}/{:?} contrast {:.2}", theme, status, ratio);
            }
        }
    }

    #[test]
    fn palettes_are_distinct() {
        let mut seen = Vec::new();
        for theme in Theme::ALL {
            for status in TaskStatus::ALL {
                let p = status_palette(status, theme);
                assert!(!seen.contains(&p), "{:?}/{:?} reuses a palette", theme, status);
                seen.push(p);
            }
        }
    }

    #[test]
    fn custom_style_wins_field_by_field() {
        let custom = NodeStyle {
            border: Some("#000000".into()),
            ..NodeStyle::default()
        };
        let merged = merge_custom(
            base_style_for_status(TaskStatus::Completed, Theme::Light),
            Some(&custom),
        );
        assert_eq!(merged.border.as_deref(), Some("#000000"));
        assert_eq!(merged.background.as_deref(), Some("#DCFCE7"));
    }

    #[test]
    fn theme_parsing() {
        assert_eq!("dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!(matches!(
            "sepia".parse::<Theme>(),
            Err(ViewError::UnknownTheme(_))
        ));
    }

    #[test]
    fn contrast_of_black_on_white() {
        let ratio = contrast_ratio("#000000", "#FFFFFF").unwrap();
        assert!((ratio - 21.0).abs() < 1e-9);
        assert!(contrast_ratio("black", "#FFFFFF").is_none());
    }

    #[test]
    fn multibyte_colour_is_rejected_not_sliced() {
        // Six bytes, but not six hex digits.
        assert!(contrast_ratio("#aéaaa", "#ffffff").is_none());
        assert!(contrast_ratio("#ffffff", "#ü0000").is_none());
    }
}
