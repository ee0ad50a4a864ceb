//! Frame drawn around a managed client

use crate::{
    config::ThemeConfig,
    error::{Error, WmResult},
    geometry::{Extents, Padding},
    monitor::client::ClientState,
    x::input::BindContext,
};
use std::ops::Add;

/// Name of a cursor in the server's cursor theme
pub(crate) type CursorRef = &'static str;

/// Pixel value of a color
pub(crate) type Color = u32;

/// What the manager asks of a theme
pub(crate) trait Theme {
    /// Space the decorations take around a client in the given state
    fn decoration_geometry_for(&self, state: &ClientState) -> Extents;

    /// Cursor shown while the pointer is over the given context
    fn cursor_for(&self, context: BindContext) -> CursorRef;

    /// Background color of a frame
    fn frame_color(&self, focused: bool) -> Color;
}

/// Borders around a window
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Border {
    /// Width of the border
    pub(crate) width: u32,
}

impl Add<Border> for Padding {
    type Output = Self;

    fn add(self, border: Border) -> Self::Output {
        Self::Output {
            left:   self.left + border.width,
            right:  self.right + border.width,
            top:    self.top + border.width,
            bottom: self.bottom + border.width,
        }
    }
}

/// Bar drawn above the client
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Titlebar {
    /// Height of the bar
    pub(crate) height: u32,
}

impl Add<Titlebar> for Padding {
    type Output = Self;

    fn add(self, bar: Titlebar) -> Self::Output {
        Self::Output {
            top: self.top + bar.height,
            ..self
        }
    }
}

// =========================== Colorscheme ============================
// ====================================================================

/// Colors of a frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Colorscheme {
    pub(crate) focused:   Color,
    pub(crate) unfocused: Color,
}

macro_rules! if_6 {
    ($c:ident) => {
        ($c.len() == 6).then(|| $c)
    };
}

/// Parse `#RRGGBB`, `0xRRGGBB` or `RRGGBB`
pub(crate) fn parse_hex(s: &str) -> WmResult<Color> {
    let trim = s.strip_prefix("0x").map_or_else(
        || s.strip_prefix('#').map_or_else(|| if_6!(s), |c| if_6!(c)),
        |c| if_6!(c),
    );

    trim.and_then(|c| u32::from_str_radix(c, 16).ok())
        .ok_or_else(|| Error::Theme(format!("invalid color: {}", s)))
}

impl Colorscheme {
    /// Default colorscheme
    pub(crate) const DEFAULT: Self = Self {
        focused:   0xA9_8698,
        unfocused: 0x4C_566A,
    };
}

impl Default for Colorscheme {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =========================== DefaultTheme ===========================
// ====================================================================

/// The [`Theme`] built from the `theme` section of the configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct DefaultTheme {
    border:   Border,
    titlebar: Titlebar,
    colors:   Colorscheme,
}

impl DefaultTheme {
    /// Build the theme, rejecting unusable colors
    pub(crate) fn new(config: &ThemeConfig) -> WmResult<Self> {
        Ok(Self {
            border:   Border {
                width: config.border_width,
            },
            titlebar: Titlebar {
                height: config.titlebar_height,
            },
            colors:   Colorscheme {
                focused:   parse_hex(&config.focused_color)?,
                unfocused: parse_hex(&config.unfocused_color)?,
            },
        })
    }
}

impl Default for DefaultTheme {
    fn default() -> Self {
        Self {
            border:   Border { width: 1 },
            titlebar: Titlebar { height: 0 },
            colors:   Colorscheme::DEFAULT,
        }
    }
}

impl Theme for DefaultTheme {
    fn decoration_geometry_for(&self, state: &ClientState) -> Extents {
        match state {
            ClientState::Normal => Extents::EMPTY + self.border + self.titlebar,
            ClientState::Maximized { .. } => Extents::EMPTY + self.border,
            ClientState::Fullscreen { .. } | ClientState::Iconic | ClientState::Withdrawn =>
                Extents::EMPTY,
        }
    }

    fn cursor_for(&self, context: BindContext) -> CursorRef {
        match context {
            BindContext::Root | BindContext::Client => "left_ptr",
            BindContext::Frame => "fleur",
        }
    }

    fn frame_color(&self, focused: bool) -> Color {
        if focused {
            self.colors.focused
        } else {
            self.colors.unfocused
        }
    }
}
