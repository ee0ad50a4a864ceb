//! Rules that decide how a new client starts

use crate::x::property::WindowProperties;
use regex::Regex;
use serde::{de, Deserialize, Deserializer};

/// State a rule places a new client in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StartState {
    Normal,
    Iconic,
    /// Leave the window unmanaged
    Withdrawn,
}

/// A rule for a new [`Client`](crate::monitor::client::Client).
///
/// Every pattern that is given has to match
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Rule {
    /// Pattern matched against the second half of `WM_CLASS`
    #[serde(default, deserialize_with = "deserialize_regex")]
    pub(crate) class:     Option<Regex>,
    /// Pattern matched against the first half of `WM_CLASS`
    #[serde(default, deserialize_with = "deserialize_regex")]
    pub(crate) instance:  Option<Regex>,
    /// Pattern matched against the window title
    #[serde(default, deserialize_with = "deserialize_regex")]
    pub(crate) name:      Option<Regex>,
    /// State to start in
    pub(crate) state:     Option<StartState>,
    /// Name of the workspace to start on
    pub(crate) workspace: Option<String>,
}

impl Rule {
    /// Does the rule apply to a window with the given properties?
    pub(crate) fn matches(&self, props: &WindowProperties) -> bool {
        let test = |re: &Option<Regex>, value: &str| re.as_ref().map_or(true, |re| re.is_match(value));

        (self.class.is_some() || self.instance.is_some() || self.name.is_some())
            && test(&self.class, &props.class)
            && test(&self.instance, &props.instance)
            && test(&self.name, &props.name)
    }
}

/// What the matching rules decided. Later rules override earlier ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RuleEffect {
    pub(crate) state:     Option<StartState>,
    pub(crate) workspace: Option<String>,
}

/// Fold every matching rule into one [`RuleEffect`]
pub(crate) fn apply(rules: &[Rule], props: &WindowProperties) -> RuleEffect {
    rules
        .iter()
        .filter(|r| r.matches(props))
        .fold(RuleEffect::default(), |mut effect, rule| {
            if let Some(state) = rule.state {
                effect.state = Some(state);
            }
            if let Some(ws) = &rule.workspace {
                effect.workspace = Some(ws.clone());
            }
            effect
        })
}

/// [`Deserialize`] an optional pattern, rejecting invalid ones
#[allow(single_use_lifetimes)]
fn deserialize_regex<'de, D>(d: D) -> Result<Option<Regex>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(d)?;
    value
        .map(|s| {
            Regex::new(&s).map_err(|e| {
                de::Error::invalid_value(de::Unexpected::Str(&s), &e.to_string().as_str())
            })
        })
        .transpose()
}
