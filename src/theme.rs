//! Theme loading: btop-style `theme[key]="value"` files and hex → ratatui Color.

use crate::Palette;
use crate::grid::TileColor;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Tile colours plus the handful of UI colours the screens use.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    /// Indexed by [`TileColor::index`]: red, blue, green, yellow, purple.
    pub tiles: [Color; 5],
    /// Board background and cleared cells.
    pub bg: Color,
    /// Borders.
    pub div_line: Color,
    /// Text.
    pub main_fg: Color,
    /// Titles and highlights.
    pub title: Color,
    /// Secondary text, paused board.
    pub inactive_fg: Color,
    /// Cursor outline.
    pub selected: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

// One Dark values (onedark.theme).
const ONEDARK_TILES: [Color; 5] = [
    Color::Rgb(0xE0, 0x6C, 0x75), // cpu_end / red
    Color::Rgb(0x61, 0xAF, 0xEF), // cpu_box / blue
    Color::Rgb(0x98, 0xC3, 0x79), // mem_box / green
    Color::Rgb(0xE5, 0xC0, 0x7B), // cpu_mid / yellow
    Color::Rgb(0xC6, 0x78, 0xDD), // net_box / magenta
];
const ONEDARK_BG: Color = Color::Rgb(0x31, 0x35, 0x3F);
const ONEDARK_DIV: Color = Color::Rgb(0x3F, 0x44, 0x4F);
const ONEDARK_FG: Color = Color::Rgb(0xAB, 0xB2, 0xBF);
const ONEDARK_TITLE: Color = Color::Rgb(0xE5, 0xC0, 0x7B);
const ONEDARK_INACTIVE: Color = Color::Rgb(0x5C, 0x63, 0x70);
const ONEDARK_SELECTED: Color = Color::Rgb(0x56, 0xB6, 0xC2);

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            tiles: ONEDARK_TILES,
            bg: ONEDARK_BG,
            div_line: ONEDARK_DIV,
            main_fg: ONEDARK_FG,
            title: ONEDARK_TITLE,
            inactive_fg: ONEDARK_INACTIVE,
            selected: ONEDARK_SELECTED,
        }
    }

    /// Load a btop-style theme file (`theme[key]="value"` or `theme[key]='value'`).
    /// One Dark when `path` is `None` or the file does not exist.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?)),
            _ => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override tile colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.tiles = [
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x00, 0xFF),
                ];
            }
            Palette::Colorblind => {
                // Paul Tol's vibrant set: no red/green pair.
                self.tiles = [
                    Color::Rgb(0xCC, 0x33, 0x11),
                    Color::Rgb(0x00, 0x77, 0xBB),
                    Color::Rgb(0x00, 0x99, 0x88),
                    Color::Rgb(0xEE, 0x77, 0x33),
                    Color::Rgb(0xEE, 0x33, 0x77),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str], fallback: Color| {
            keys.iter()
                .find_map(|k| map.get(*k).and_then(|v| parse_hex(v).ok()))
                .unwrap_or(fallback)
        };
        Self {
            tiles: [
                get(&["cpu_end", "temp_end"], ONEDARK_TILES[0]),
                get(&["cpu_box"], ONEDARK_TILES[1]),
                get(&["mem_box", "cpu_start"], ONEDARK_TILES[2]),
                get(&["cpu_mid", "title"], ONEDARK_TILES[3]),
                get(&["net_box"], ONEDARK_TILES[4]),
            ],
            bg: get(&["meter_bg"], ONEDARK_BG),
            div_line: get(&["div_line"], ONEDARK_DIV),
            main_fg: get(&["main_fg"], ONEDARK_FG),
            title: get(&["title"], ONEDARK_TITLE),
            inactive_fg: get(&["inactive_fg"], ONEDARK_INACTIVE),
            selected: get(&["hi_fg", "selected_bg"], ONEDARK_SELECTED),
        }
    }

    #[inline]
    pub fn tile_color(&self, color: TileColor) -> Color {
        self.tiles[color.index()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
