use std::{ops::Not, str::FromStr};

/// Status of a switch that can be toggled on or off
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Toggle {
    /// Status is on
    On,
    /// Status is off
    Off,
    /// Switch the current state
    Invert,
}

impl Toggle {
    /// Evaluate the [`Toggle`] against the current status
    pub(crate) const fn eval(self, current: bool) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Invert => !current,
        }
    }

    /// Decode the action field of a `_NET_WM_STATE` client message
    pub(crate) const fn from_net_wm_state(action: u32) -> Option<Self> {
        match action {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            2 => Some(Self::Invert),
            _ => None,
        }
    }

    /// The argument word used on the command channel
    pub(crate) const fn as_arg(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Invert => "toggle",
        }
    }
}

impl Default for Toggle {
    fn default() -> Self {
        Self::Invert
    }
}

impl From<bool> for Toggle {
    fn from(toggle: bool) -> Self {
        if toggle {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl Not for Toggle {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
            Self::Invert => Self::Invert,
        }
    }
}

impl FromStr for Toggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(Self::On),
            "off" | "false" | "no" | "0" => Ok(Self::Off),
            "toggle" | "invert" => Ok(Self::Invert),
            other => Err(format!("`{}` is not one of on, off or toggle", other)),
        }
    }
}
