//! Input into the window manager

use crate::{
    error::{Error, WmResult},
    x::keysym,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};
use x11rb::protocol::xproto::ModMask as XModMask;

// ============================== ModMask =============================
// ====================================================================

/// Keycode modifier that is held
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ModMask {
    /// Left or right `shift` key
    Shift,
    /// Caps-lock
    Lock,
    /// Left or right `control` key
    #[serde(alias = "ctrl")]
    Control,
    /// Modifier 1 as defined in `xmodmap` (usually `alt`)
    Mod1,
    /// Modifier 2 as defined in `xmodmap` (usually `num-lock`)
    Mod2,
    /// Modifier 3 as defined in `xmodmap` (usually blank)
    Mod3,
    /// Modifier 4 as defined in `xmodmap` (usually `super`)
    Mod4,
    /// Modifier 5 as defined or in `xmodmap` (usually `mode_shift`)
    Mod5,
}

impl ModMask {
    /// Was the modifier held in the given state?
    pub(crate) fn was_held(self, mask: u16) -> bool {
        mask & u16::from(self) > 0
    }

    /// Modifiers that never take part in matching a chord
    pub(crate) fn ignored() -> u16 {
        u16::from(Self::Lock) | u16::from(Self::Mod2)
    }

    /// Every combination of the ignored modifiers, used when grabbing
    pub(crate) fn ignored_combinations() -> [u16; 4] {
        let (lock, num) = (u16::from(Self::Lock), u16::from(Self::Mod2));
        [0, lock, num, lock | num]
    }

    /// Strip everything but the modifiers that are matched on
    pub(crate) fn normalize(state: u16) -> u16 {
        Self::iter()
            .filter(|m| m.was_held(state))
            .fold(0, |acc, m| acc | u16::from(m))
            & !Self::ignored()
    }
}

impl From<ModMask> for u16 {
    fn from(m: ModMask) -> Self {
        u16::from(match m {
            ModMask::Shift => XModMask::SHIFT,
            ModMask::Lock => XModMask::LOCK,
            ModMask::Control => XModMask::CONTROL,
            ModMask::Mod1 => XModMask::M1,
            ModMask::Mod2 => XModMask::M2,
            ModMask::Mod3 => XModMask::M3,
            ModMask::Mod4 => XModMask::M4,
            ModMask::Mod5 => XModMask::M5,
        })
    }
}

impl FromStr for ModMask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shift" => Ok(Self::Shift),
            "lock" => Ok(Self::Lock),
            "control" | "ctrl" => Ok(Self::Control),
            "mod1" | "alt" => Ok(Self::Mod1),
            "mod2" => Ok(Self::Mod2),
            "mod3" => Ok(Self::Mod3),
            "mod4" | "super" => Ok(Self::Mod4),
            "mod5" => Ok(Self::Mod5),
            other => Err(format!("unknown modifier `{}`", other)),
        }
    }
}

impl fmt::Display for ModMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================== Button ==============================
// ====================================================================

/// Available buttons on a mouse
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Button {
    /// 1, Left-click
    #[serde(rename = "mouse1", alias = "button1")]
    Left,
    /// 2, Middle-click
    #[serde(rename = "mouse2", alias = "button2")]
    Middle,
    /// 3, Right-click
    #[serde(rename = "mouse3", alias = "button3")]
    Right,
    /// 4, Wheel-scroll up
    #[serde(alias = "scroll-up", alias = "scroll_up")]
    ScrollUp,
    /// 5, Wheel-scroll down
    #[serde(alias = "scroll-down", alias = "scroll_down")]
    ScrollDown,
}

impl From<Button> for u8 {
    fn from(b: Button) -> Self {
        match b {
            Button::Left => 1,
            Button::Middle => 2,
            Button::Right => 3,
            Button::ScrollUp => 4,
            Button::ScrollDown => 5,
        }
    }
}

impl TryFrom<u8> for Button {
    type Error = String;

    fn try_from(u: u8) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(Self::Left),
            2 => Ok(Self::Middle),
            3 => Ok(Self::Right),
            4 => Ok(Self::ScrollUp),
            5 => Ok(Self::ScrollDown),
            _ => Err(format!("mouse button {} is unknown", u)),
        }
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let number = lower
            .strip_prefix("button")
            .or_else(|| lower.strip_prefix("mouse"))
            .ok_or_else(|| format!("`{}` is not a button", s))?;

        number
            .parse::<u8>()
            .map_err(|e| e.to_string())
            .and_then(Self::try_from)
    }
}

// ============================ BindContext ===========================
// ====================================================================

/// Where a chord was pressed
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BindContext {
    /// The root window
    Root,
    /// A managed client window
    Client,
    /// The decoration frame of a client
    Frame,
}

impl Default for BindContext {
    fn default() -> Self {
        Self::Root
    }
}

// =============================== Chord ==============================
// ====================================================================

/// What completes a chord
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// A key, by keysym
    Key(u32),
    /// A mouse button
    Button(Button),
}

/// A chord as written in the configuration, e.g. `Mod4-Shift-q` or
/// `Mod1-button1`
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub(crate) struct ChordSpec {
    /// Normalized modifier mask
    pub(crate) mods:    u16,
    pub(crate) trigger: Trigger,
}

impl FromStr for ChordSpec {
    type Err = Error;

    fn from_str(s: &str) -> WmResult<Self> {
        let unknown = |reason: String| Error::UnknownBinding {
            chord: s.to_owned(),
            reason,
        };

        let mut parts = s.split('-').map(str::trim).collect::<Vec<_>>();
        let last = parts
            .pop()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| unknown(String::from("empty chord")))?;

        let mods = parts.iter().try_fold(0_u16, |acc, m| {
            m.parse::<ModMask>()
                .map(|m| acc | u16::from(m))
                .map_err(unknown)
        })?;

        let trigger = match last.parse::<Button>() {
            Ok(button) => Trigger::Button(button),
            Err(_) => Trigger::Key(
                keysym::from_name(last)
                    .ok_or_else(|| unknown(format!("unknown key `{}`", last)))?,
            ),
        };

        Ok(Self {
            mods: ModMask::normalize(mods),
            trigger,
        })
    }
}

/// A chord resolved against the current keyboard mapping
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub(crate) struct Chord {
    /// Normalized modifier mask
    pub(crate) mods:   u16,
    /// Keycode or button number
    pub(crate) detail: u8,
    /// Whether `detail` is a button
    pub(crate) button: bool,
}

impl Chord {
    /// A key chord from the raw event state
    pub(crate) fn key(state: u16, keycode: u8) -> Self {
        Self {
            mods:   ModMask::normalize(state),
            detail: keycode,
            button: false,
        }
    }

    /// A button chord from the raw event state
    pub(crate) fn button(state: u16, button: u8) -> Self {
        Self {
            mods:   ModMask::normalize(state),
            detail: button,
            button: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Button, Chord, ChordSpec, ModMask, Trigger};
    use crate::x::keysym;
    use x11rb::protocol::xproto::ModMask as XModMask;

    #[test]
    fn lock_and_numlock_are_ignored() {
        let state = u16::from(XModMask::M4 | XModMask::LOCK | XModMask::M2);
        assert_eq!(ModMask::normalize(state), u16::from(XModMask::M4));
    }

    #[test]
    fn button_state_bits_are_ignored() {
        // Button1Mask is bit 8
        let state = u16::from(XModMask::SHIFT) | (1 << 8);
        assert_eq!(Chord::button(state, 1), Chord::button(u16::from(XModMask::SHIFT), 1));
    }

    #[test]
    fn parse_key_chord() {
        let spec = "Mod4-Shift-q".parse::<ChordSpec>().unwrap();
        assert_eq!(spec.mods, u16::from(XModMask::M4 | XModMask::SHIFT));
        assert_eq!(spec.trigger, Trigger::Key(keysym::from_name("q").unwrap()));
    }

    #[test]
    fn parse_button_chord() {
        let spec = "Mod1-button3".parse::<ChordSpec>().unwrap();
        assert_eq!(spec.mods, u16::from(XModMask::M1));
        assert_eq!(spec.trigger, Trigger::Button(Button::Right));
    }

    #[test]
    fn reject_unknown_parts() {
        assert!("Hyper-q".parse::<ChordSpec>().is_err());
        assert!("Mod4-nosuchkey".parse::<ChordSpec>().is_err());
        assert!("".parse::<ChordSpec>().is_err());
    }
}
