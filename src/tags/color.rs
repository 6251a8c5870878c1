use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TagError;

/// Tag colors, matching the macOS Finder palette.
///
/// The set is closed: colors are never created at runtime, only their
/// display names can be customised (see [`TagRegistry::set_display_name`]).
///
/// [`TagRegistry::set_display_name`]: crate::tags::TagRegistry::set_display_name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Gray,
}

impl TagColor {
    /// Every color in palette order.
    pub const ALL: [TagColor; 7] = [
        TagColor::Red,
        TagColor::Orange,
        TagColor::Yellow,
        TagColor::Green,
        TagColor::Blue,
        TagColor::Purple,
        TagColor::Gray,
    ];

    /// Identifier used in persisted state and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            TagColor::Red => "Red",
            TagColor::Orange => "Orange",
            TagColor::Yellow => "Yellow",
            TagColor::Green => "Green",
            TagColor::Blue => "Blue",
            TagColor::Purple => "Purple",
            TagColor::Gray => "Gray",
        }
    }

    /// Built-in display name used until the user picks a custom one.
    pub fn default_label(&self) -> &'static str {
        self.as_str()
    }

    /// Theme color id used for explorer badges.
    pub fn theme_color(&self) -> &'static str {
        match self {
            TagColor::Red => "charts.red",
            TagColor::Orange => "charts.orange",
            TagColor::Yellow => "charts.yellow",
            TagColor::Green => "charts.green",
            TagColor::Blue => "charts.blue",
            TagColor::Purple => "charts.purple",
            TagColor::Gray => "charts.gray",
        }
    }
}

impl fmt::Display for TagColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagColor {
    type Err = TagError;

    /// Case-insensitive; `Grey` is accepted as an alias for [`TagColor::Gray`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("grey") {
            return Ok(TagColor::Gray);
        }
        TagColor::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TagError::UnknownColor(s.to_string()))
    }
}
