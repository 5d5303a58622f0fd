//! Typed locators for element selection.
//!
//! A [`Locator`] is a recipe for finding UI nodes. It owns no live handle and
//! can be re-evaluated any number of times. The set of strategies is closed so
//! that fallback chains can be reasoned about statically; every variant renders
//! to a single XPath 1.0 expression for the session backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::result::{HarnessError, HarnessResult};

/// A point in 2D page space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box of a rendered element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the center point
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Zero-area boxes are never considered rendered
    #[must_use]
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Check if a point is inside this bounding box
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Strategy tag of a [`Locator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Match on text content
    ByText,
    /// Match on an attribute name and optional value
    ByAttribute,
    /// Raw structural XPath
    ByStructuralPath,
    /// Match on a fragment of an auto-generated class name
    ByCssClassFragment,
}

impl Strategy {
    /// Short name used in diagnostics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ByText => "text",
            Self::ByAttribute => "attribute",
            Self::ByStructuralPath => "path",
            Self::ByCssClassFragment => "class-fragment",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reusable recipe for finding UI elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    /// Elements whose own text contains (or equals) `text`
    ByText {
        /// Text to match
        text: String,
        /// Restrict to a tag name (`*` when absent)
        tag: Option<String>,
        /// Require the normalized text to equal `text`
        exact: bool,
    },
    /// Elements carrying an attribute, optionally with an exact value
    ByAttribute {
        /// Attribute name
        name: String,
        /// Required value (presence only when absent)
        value: Option<String>,
        /// Restrict to a tag name (`*` when absent)
        tag: Option<String>,
    },
    /// Raw XPath describing a structural position
    ByStructuralPath(String),
    /// Elements whose class attribute contains `fragment`, optionally followed
    /// by a descendant path relative to them
    ByCssClassFragment {
        /// Stable part of a generated class name
        fragment: String,
        /// Restrict to a tag name (`*` when absent)
        tag: Option<String>,
        /// Relative XPath appended to the match, starting with `/`
        descendant: Option<String>,
    },
}

impl Locator {
    /// Elements whose text contains `text`, in its given or lowercase form
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::ByText {
            text: text.into(),
            tag: None,
            exact: false,
        }
    }

    /// Elements whose normalized text equals `text`
    #[must_use]
    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::ByText {
            text: text.into(),
            tag: None,
            exact: true,
        }
    }

    /// Elements with `name="value"`
    #[must_use]
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ByAttribute {
            name: name.into(),
            value: Some(value.into()),
            tag: None,
        }
    }

    /// Elements that carry `name` with any value
    #[must_use]
    pub fn has_attribute(name: impl Into<String>) -> Self {
        Self::ByAttribute {
            name: name.into(),
            value: None,
            tag: None,
        }
    }

    /// Raw structural XPath
    #[must_use]
    pub fn path(xpath: impl Into<String>) -> Self {
        Self::ByStructuralPath(xpath.into())
    }

    /// Elements whose class contains `fragment`
    #[must_use]
    pub fn class_fragment(fragment: impl Into<String>) -> Self {
        Self::ByCssClassFragment {
            fragment: fragment.into(),
            tag: None,
            descendant: None,
        }
    }

    /// Restrict text, attribute or class-fragment matches to a tag name.
    /// Has no effect on structural paths.
    #[must_use]
    pub fn with_tag(self, tag_name: impl Into<String>) -> Self {
        let tag_name = Some(tag_name.into());
        match self {
            Self::ByText { text, exact, .. } => Self::ByText {
                text,
                tag: tag_name,
                exact,
            },
            Self::ByAttribute { name, value, .. } => Self::ByAttribute {
                name,
                value,
                tag: tag_name,
            },
            Self::ByCssClassFragment {
                fragment,
                descendant,
                ..
            } => Self::ByCssClassFragment {
                fragment,
                tag: tag_name,
                descendant,
            },
            path @ Self::ByStructuralPath(_) => path,
        }
    }

    /// Append a relative path below a class-fragment match
    #[must_use]
    pub fn with_descendant(self, relative: impl Into<String>) -> Self {
        match self {
            Self::ByCssClassFragment { fragment, tag, .. } => Self::ByCssClassFragment {
                fragment,
                tag,
                descendant: Some(relative.into()),
            },
            other => Self::ByStructuralPath(format!("({}){}", other.expression(), relative.into())),
        }
    }

    /// Direct children of every node this locator matches
    #[must_use]
    pub fn children(&self) -> Self {
        Self::ByStructuralPath(format!("({})/*", self.expression()))
    }

    /// Strategy tag
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        match self {
            Self::ByText { .. } => Strategy::ByText,
            Self::ByAttribute { .. } => Strategy::ByAttribute,
            Self::ByStructuralPath(_) => Strategy::ByStructuralPath,
            Self::ByCssClassFragment { .. } => Strategy::ByCssClassFragment,
        }
    }

    /// Render as an XPath 1.0 expression
    #[must_use]
    pub fn expression(&self) -> String {
        match self {
            Self::ByText { text, tag, exact } => {
                let tag = tag.as_deref().unwrap_or("*");
                if *exact {
                    format!("//{tag}[normalize-space()={}]", xpath_literal(text))
                } else {
                    let lower = text.to_lowercase();
                    if lower == *text {
                        format!("//{tag}[contains(text(), {})]", xpath_literal(text))
                    } else {
                        format!(
                            "//{tag}[contains(text(), {}) or contains(text(), {})]",
                            xpath_literal(text),
                            xpath_literal(&lower)
                        )
                    }
                }
            }
            Self::ByAttribute { name, value, tag } => {
                let tag = tag.as_deref().unwrap_or("*");
                match value {
                    Some(value) => format!("//{tag}[@{name}={}]", xpath_literal(value)),
                    None => format!("//{tag}[@{name}]"),
                }
            }
            Self::ByStructuralPath(path) => path.clone(),
            Self::ByCssClassFragment {
                fragment,
                tag,
                descendant,
            } => {
                let tag = tag.as_deref().unwrap_or("*");
                format!(
                    "//{tag}[contains(@class, {})]{}",
                    xpath_literal(fragment),
                    descendant.as_deref().unwrap_or("")
                )
            }
        }
    }

    /// Reject locators that can never match anything meaningful
    pub fn validate(&self) -> HarnessResult<()> {
        let invalid = |message: String| Err(HarnessError::InvalidConfiguration { message });
        match self {
            Self::ByText { text, tag, .. } => {
                if text.trim().is_empty() {
                    return invalid("text locator needs non-blank text".into());
                }
                validate_tag(tag.as_deref())
            }
            Self::ByAttribute { name, tag, .. } => {
                if !name_pattern().is_match(name) {
                    return invalid(format!("'{name}' is not a valid attribute name"));
                }
                validate_tag(tag.as_deref())
            }
            Self::ByStructuralPath(path) => {
                let path = path.trim_start();
                if !(path.starts_with('/') || path.starts_with('(')) {
                    return invalid(format!("structural path '{path}' must be absolute"));
                }
                Ok(())
            }
            Self::ByCssClassFragment {
                fragment,
                tag,
                descendant,
            } => {
                if fragment.trim().is_empty() {
                    return invalid("class fragment must not be blank".into());
                }
                if let Some(rel) = descendant {
                    if !rel.starts_with('/') {
                        return invalid(format!("descendant path '{rel}' must start with '/'"));
                    }
                }
                validate_tag(tag.as_deref())
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByText { text, exact, .. } => {
                if *exact {
                    write!(f, "text=({text:?})")
                } else {
                    write!(f, "text({text:?})")
                }
            }
            Self::ByAttribute { name, value, .. } => match value {
                Some(v) => write!(f, "attribute({name}={v:?})"),
                None => write!(f, "attribute({name})"),
            },
            Self::ByStructuralPath(path) => write!(f, "path({path})"),
            Self::ByCssClassFragment { fragment, .. } => write!(f, "class-fragment({fragment})"),
        }
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_:.\-]*$").expect("static regex"))
}

fn validate_tag(tag: Option<&str>) -> HarnessResult<()> {
    match tag {
        None | Some("*") => Ok(()),
        Some(t) if name_pattern().is_match(t) => Ok(()),
        Some(t) => Err(HarnessError::invalid_configuration(format!(
            "'{t}' is not a valid tag name"
        ))),
    }
}

/// Quote `value` as an XPath 1.0 string literal.
///
/// XPath 1.0 has no escape sequences, so a value containing both quote kinds
/// is assembled with `concat()`.
#[must_use]
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod rendering_tests {
        use super::*;

        #[test]
        fn test_text_contains_includes_lowercase_variant() {
            let loc = Locator::text("Mumbai").with_tag("div");
            assert_eq!(
                loc.expression(),
                "//div[contains(text(), 'Mumbai') or contains(text(), 'mumbai')]"
            );
        }

        #[test]
        fn test_text_lowercase_has_single_clause() {
            let loc = Locator::text("genre");
            assert_eq!(loc.expression(), "//*[contains(text(), 'genre')]");
        }

        #[test]
        fn test_exact_text() {
            let loc = Locator::exact_text("Sign in").with_tag("div");
            assert_eq!(loc.expression(), "//div[normalize-space()='Sign in']");
        }

        #[test]
        fn test_attribute_value_and_presence() {
            assert_eq!(
                Locator::attribute("data-card-index", "0").expression(),
                "//*[@data-card-index='0']"
            );
            assert_eq!(
                Locator::has_attribute("data-event-card").expression(),
                "//*[@data-event-card]"
            );
        }

        #[test]
        fn test_class_fragment_with_descendant() {
            let loc = Locator::class_fragment("sc-fv93km-0")
                .with_tag("div")
                .with_descendant("//div[1]//div[1]");
            assert_eq!(
                loc.expression(),
                "//div[contains(@class, 'sc-fv93km-0')]//div[1]//div[1]"
            );
        }

        #[test]
        fn test_children_wraps_union() {
            let loc = Locator::path("//h1 | //h2").children();
            assert_eq!(loc.expression(), "(//h1 | //h2)/*");
            assert_eq!(loc.strategy(), Strategy::ByStructuralPath);
        }

        #[test]
        fn test_descendant_on_non_fragment_becomes_path() {
            let loc = Locator::attribute("id", "menu").with_descendant("//a");
            assert_eq!(loc.expression(), "(//*[@id='menu'])//a");
        }

        #[test]
        fn test_with_tag_ignored_for_paths() {
            let loc = Locator::path("//section").with_tag("div");
            assert_eq!(loc, Locator::path("//section"));
        }
    }

    mod literal_tests {
        use super::*;

        #[test]
        fn test_plain_literal() {
            assert_eq!(xpath_literal("Delhi"), "'Delhi'");
        }

        #[test]
        fn test_single_quote_uses_double() {
            assert_eq!(xpath_literal("Rock'n"), "\"Rock'n\"");
        }

        #[test]
        fn test_both_quotes_uses_concat() {
            assert_eq!(
                xpath_literal(r#"a'b"c"#),
                r#"concat('a', "'", 'b"c')"#
            );
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_blank_text_rejected() {
            assert!(matches!(
                Locator::text("   ").validate(),
                Err(HarnessError::InvalidConfiguration { .. })
            ));
        }

        #[test]
        fn test_bad_attribute_name_rejected() {
            assert!(Locator::attribute("data x", "1").validate().is_err());
            assert!(Locator::attribute("data-x", "1").validate().is_ok());
        }

        #[test]
        fn test_relative_path_rejected() {
            assert!(Locator::path("div/a").validate().is_err());
            assert!(Locator::path("(//div)[1]").validate().is_ok());
        }

        #[test]
        fn test_descendant_must_be_rooted() {
            let loc = Locator::class_fragment("sc-").with_descendant("div[1]");
            assert!(loc.validate().is_err());
        }

        #[test]
        fn test_bad_tag_rejected() {
            assert!(Locator::text("x").with_tag("a b").validate().is_err());
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_display_names_strategy() {
            assert_eq!(Locator::text("Pune").to_string(), "text(\"Pune\")");
            assert_eq!(
                Locator::attribute("alt", "Coming Soon").to_string(),
                "attribute(alt=\"Coming Soon\")"
            );
            assert_eq!(
                Locator::class_fragment("sc-1y4pbdw-4").to_string(),
                "class-fragment(sc-1y4pbdw-4)"
            );
        }
    }

    mod bounding_box_tests {
        use super::*;

        #[test]
        fn test_bounding_box_center() {
            let bbox = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
            let center = bbox.center();
            assert!((center.x - 50.0).abs() < f64::EPSILON);
            assert!((center.y - 25.0).abs() < f64::EPSILON);
            assert!(bbox.contains(&center));
        }

        #[test]
        fn test_zero_size_has_no_area() {
            assert!(!BoundingBox::new(10.0, 10.0, 0.0, 20.0).has_area());
            assert!(BoundingBox::new(10.0, 10.0, 1.0, 1.0).has_area());
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// Evaluate a literal produced by `xpath_literal` the way an XPath
        /// engine would.
        fn eval_literal(lit: &str) -> String {
            if let Some(inner) = lit.strip_prefix("concat(").and_then(|s| s.strip_suffix(')')) {
                let mut out = String::new();
                let mut rest = inner;
                while !rest.is_empty() {
                    let quote = rest.chars().next().unwrap();
                    let end = rest[1..].find(quote).unwrap() + 1;
                    out.push_str(&rest[1..end]);
                    rest = rest[end + 1..].trim_start_matches(", ");
                }
                out
            } else {
                lit[1..lit.len() - 1].to_string()
            }
        }

        proptest! {
            #[test]
            fn prop_literal_evaluates_to_input(s in "[a-zA-Z0-9 '\"]{0,24}") {
                prop_assert_eq!(eval_literal(&xpath_literal(&s)), s);
            }

            #[test]
            fn prop_text_locator_always_valid_xpath_prefix(s in "[a-zA-Z][a-zA-Z ]{0,16}") {
                let loc = Locator::text(s);
                prop_assert!(loc.validate().is_ok());
                prop_assert!(loc.expression().starts_with("//*["));
            }
        }
    }
}
