//! Accessibility color themes, applied as an injected stylesheet

use std::fmt;
use std::str::FromStr;

use crate::dom::{Document, Element};
use crate::error::Error;

pub const THEME_ATTRIBUTE: &str = "data-theme";
pub const STYLE_ID: &str = "accessibility-theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Default,
    HighContrast,
    Protanopia,
    Deuteranopia,
    Tritanopia,
}

const HIGH_CONTRAST: [(&str, &str); 6] = [
    ("background-color", "#000000"),
    ("color", "#FFFFFF"),
    ("--text-color", "#FFFFFF"),
    ("--background-color", "#000000"),
    ("--link-color", "#FFFF00"),
    ("--border-color", "#FFFFFF"),
];

impl Theme {
    pub const ALL: [Theme; 5] = [
        Theme::Default,
        Theme::HighContrast,
        Theme::Protanopia,
        Theme::Deuteranopia,
        Theme::Tritanopia,
    ];

    /// Wire name, also written to the `data-theme` attribute
    pub fn name(&self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::HighContrast => "high-contrast",
            Theme::Protanopia => "protanopia",
            Theme::Deuteranopia => "deuteranopia",
            Theme::Tritanopia => "tritanopia",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Theme::Default => "Default",
            Theme::HighContrast => "High Contrast",
            Theme::Protanopia => "Protanopia (Red-Blind)",
            Theme::Deuteranopia => "Deuteranopia (Green-Blind)",
            Theme::Tritanopia => "Tritanopia (Blue-Blind)",
        }
    }

    /// Color matrix rows for the color-vision simulations
    fn color_matrix(&self) -> Option<&'static str> {
        match self {
            Theme::Protanopia => Some("0.567,0.433,0,0,0 0.558,0.442,0,0,0 0,0.242,0.758,0,0 0,0,0,1,0"),
            Theme::Deuteranopia => Some("0.625,0.375,0,0,0 0.7,0.3,0,0,0 0,0.3,0.7,0,0 0,0,0,1,0"),
            Theme::Tritanopia => Some("0.95,0.05,0,0,0 0,0.433,0.567,0,0 0,0.475,0.525,0,0 0,0,0,1,0"),
            Theme::Default | Theme::HighContrast => None,
        }
    }

    /// CSS `filter` value for filter-based themes
    pub fn filter(&self) -> Option<String> {
        let matrix = self.color_matrix()?;
        let id = self.name();
        Some(format!(
            "url(\"data:image/svg+xml,<svg xmlns='http://www.w3.org/2000/svg'><filter id='{id}'>\
             <feColorMatrix type='matrix' values='{matrix}'/></filter></svg>#{id}\")"
        ))
    }

    /// Stylesheet text, empty for the default theme
    pub fn css(&self) -> String {
        match self {
            Theme::Default => String::new(),
            Theme::HighContrast => {
                let rules: String = HIGH_CONTRAST
                    .iter()
                    .map(|(property, value)| format!("{property}: {value} !important;"))
                    .collect();
                format!("html {{{rules}}}")
            }
            _ => {
                let filter = self.filter().unwrap_or_default();
                format!(
                    ":root {{ filter: {filter} !important; }} \
                     img, video, canvas {{ filter: {filter} !important; }}"
                )
            }
        }
    }

    /// Replace any previous overlay on `doc` with this theme. An existing
    /// overlay element is rewritten in place rather than recreated.
    pub fn apply(&self, doc: &mut Document) {
        let root = doc.root();
        let existing = doc.element_by_id(STYLE_ID);
        match (existing, *self) {
            (Some(style), Theme::Default) => doc.remove(style),
            (None, Theme::Default) => {}
            (Some(style), _) => doc.set_text(style, &self.css()),
            (None, _) => {
                let head = doc.first_by_tag("head").unwrap_or(root);
                let style = doc.append(head, Element::new("style").attr("id", STYLE_ID));
                doc.append_text(style, &self.css());
            }
        }
        doc.set_attribute(root, THEME_ATTRIBUTE, self.name());
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| Error::UnknownTheme(s.to_string()))
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
