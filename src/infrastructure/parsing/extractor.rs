//! Safe Field Extractor
//!
//! Applies a field's primary selector and then its fallbacks to a container
//! node, returning the first non-empty match or `None`. Nothing in here
//! returns an error to the caller: malformed selectors compile to inert
//! entries and simply never match.
//!
//! Selector syntax is a CSS selector optionally followed by `@attribute`:
//! `h2 span` yields trimmed text content, `h2 a @href` yields the trimmed
//! attribute value, and a bare `@data-asin` reads the container's own
//! attribute. Whether a result is text or an attribute is decided by this
//! syntax alone, never by the field name.

use scraper::{ElementRef, Selector};
use tracing::warn;

use super::error::{ParsingError, ParsingResult};
use crate::domain::FieldSelector;

/// One parsed selector expression
#[derive(Debug, Clone)]
pub enum SelectorExpr {
    /// Text content of the first element with non-empty text
    Text(Selector),
    /// Attribute of the first matching element carrying it; `scope == None`
    /// reads the node itself
    Attribute {
        scope: Option<Selector>,
        attribute: String,
    },
}

impl SelectorExpr {
    pub fn parse(raw: &str) -> ParsingResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParsingError::EmptySelector);
        }

        let (css, attribute) = split_attribute_suffix(raw);

        match attribute {
            Some(attribute) => {
                let scope = match css {
                    Some(css) => Some(compile_css(css)?),
                    None => None,
                };
                Ok(Self::Attribute {
                    scope,
                    attribute: attribute.to_string(),
                })
            }
            None => Ok(Self::Text(compile_css(raw)?)),
        }
    }

    /// First non-empty trimmed value under `node`
    pub fn first_value(&self, node: &ElementRef<'_>) -> Option<String> {
        match self {
            Self::Text(selector) => node
                .select(selector)
                .map(|element| element.text().collect::<String>())
                .map(|text| text.trim().to_string())
                .find(|text| !text.is_empty()),
            Self::Attribute { scope: None, attribute } => non_empty_attr(node, attribute),
            Self::Attribute {
                scope: Some(selector),
                attribute,
            } => node
                .select(selector)
                .find_map(|element| non_empty_attr(&element, attribute)),
        }
    }

    /// Whether the expression matches anything under `node`
    pub fn matches(&self, node: &ElementRef<'_>) -> bool {
        match self {
            Self::Text(selector) => node.select(selector).next().is_some(),
            Self::Attribute { scope: None, attribute } => node.value().attr(attribute).is_some(),
            Self::Attribute {
                scope: Some(selector),
                attribute,
            } => node
                .select(selector)
                .any(|element| element.value().attr(attribute).is_some()),
        }
    }
}

fn non_empty_attr(node: &ElementRef<'_>, attribute: &str) -> Option<String> {
    node.value()
        .attr(attribute)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn compile_css(css: &str) -> ParsingResult<Selector> {
    Selector::parse(css).map_err(|e| ParsingError::invalid_selector(css, e.to_string()))
}

/// Split `"<css> @attr"` into its parts. The attribute is `None` when the
/// string carries no valid suffix; the css is `None` for a bare `@attr`.
fn split_attribute_suffix(raw: &str) -> (Option<&str>, Option<&str>) {
    if let Some(attr) = raw.strip_prefix('@') {
        if is_attribute_name(attr) {
            return (None, Some(attr));
        }
    }

    if let Some((css, last)) = raw.rsplit_once(char::is_whitespace) {
        if let Some(attr) = last.strip_prefix('@') {
            if is_attribute_name(attr) && !css.trim().is_empty() {
                return (Some(css.trim()), Some(attr));
            }
        }
    }

    (None, None)
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// A field's selector chain, compiled once per session
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    pub field_name: String,
    /// Primary first; `None` marks an entry that failed to compile
    candidates: Vec<Option<SelectorExpr>>,
}

impl CompiledSelector {
    /// Compile every candidate. Invalid entries are kept as inert slots and
    /// logged once here instead of at every extraction.
    pub fn compile(selector: &FieldSelector) -> Self {
        let candidates = selector
            .candidates()
            .map(|raw| match SelectorExpr::parse(raw) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    warn!("Field '{}': ignoring selector: {}", selector.field_name, e);
                    None
                }
            })
            .collect();

        Self {
            field_name: selector.field_name.clone(),
            candidates,
        }
    }

    /// Number of candidates that compiled
    pub fn usable_count(&self) -> usize {
        self.candidates.iter().flatten().count()
    }

    fn usable(&self) -> impl Iterator<Item = &SelectorExpr> {
        self.candidates.iter().flatten()
    }

    /// Element-matching candidates only; attribute expressions are skipped
    pub fn element_selectors(&self) -> impl Iterator<Item = &Selector> {
        self.usable().filter_map(|expr| match expr {
            SelectorExpr::Text(selector) => Some(selector),
            SelectorExpr::Attribute { .. } => None,
        })
    }
}

/// Stateless extraction entry points
pub struct SafeFieldExtractor;

impl SafeFieldExtractor {
    /// First non-empty value produced by the selector chain, or `None`
    pub fn extract(node: &ElementRef<'_>, selector: &CompiledSelector) -> Option<String> {
        selector.usable().find_map(|expr| expr.first_value(node))
    }

    /// Whether any selector in the chain matches, regardless of content
    pub fn is_present(node: &ElementRef<'_>, selector: &CompiledSelector) -> bool {
        selector.usable().any(|expr| expr.matches(node))
    }

    /// Convenience for one-off extraction from an uncompiled selector
    pub fn extract_with(node: &ElementRef<'_>, selector: &FieldSelector) -> Option<String> {
        Self::extract(node, &CompiledSelector::compile(selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const CARD: &str = r#"
        <div class="card" data-asin="B0TEST" data-index="3">
            <h2><a href=" /dp/B0TEST?ref=x "><span>  Samsung 55" QLED  </span></a></h2>
            <span class="price"><span class="a-offscreen">$499.99</span></span>
            <span class="empty">   </span>
        </div>
    "#;

    fn with_card<F: FnOnce(ElementRef<'_>)>(f: F) {
        let doc = Html::parse_fragment(CARD);
        let card = doc
            .select(&Selector::parse("div.card").unwrap())
            .next()
            .unwrap();
        f(card);
    }

    #[test]
    fn element_selector_returns_trimmed_text() {
        with_card(|card| {
            let sel = FieldSelector::new("product_name", "h2 span");
            assert_eq!(
                SafeFieldExtractor::extract_with(&card, &sel).as_deref(),
                Some("Samsung 55\" QLED")
            );
        });
    }

    #[test]
    fn attribute_suffix_returns_trimmed_attribute() {
        with_card(|card| {
            let sel = FieldSelector::new("product_url", "h2 a @href");
            assert_eq!(
                SafeFieldExtractor::extract_with(&card, &sel).as_deref(),
                Some("/dp/B0TEST?ref=x")
            );
        });
    }

    #[test]
    fn bare_attribute_reads_container_itself() {
        with_card(|card| {
            let sel = FieldSelector::new("asin", "@data-asin");
            assert_eq!(SafeFieldExtractor::extract_with(&card, &sel).as_deref(), Some("B0TEST"));
        });
    }

    #[test]
    fn falls_back_past_missing_empty_and_malformed_selectors() {
        with_card(|card| {
            let sel = FieldSelector::new("final_price", "span.missing")
                .with_fallbacks(["span.empty", "div[[[", ".price .a-offscreen"]);
            assert_eq!(SafeFieldExtractor::extract_with(&card, &sel).as_deref(), Some("$499.99"));
        });
    }

    #[test]
    fn all_failing_selectors_yield_absent() {
        with_card(|card| {
            let sel = FieldSelector::new("shipping", ">>>").with_fallbacks(["", "p.ship", "@missing"]);
            assert_eq!(SafeFieldExtractor::extract_with(&card, &sel), None);
        });
    }

    #[test]
    fn presence_ignores_content() {
        with_card(|card| {
            let empty = CompiledSelector::compile(&FieldSelector::new("flag", "span.empty"));
            let missing = CompiledSelector::compile(&FieldSelector::new("flag", "div.sponsored"));
            assert!(SafeFieldExtractor::is_present(&card, &empty));
            assert!(!SafeFieldExtractor::is_present(&card, &missing));
        });
    }

    #[test]
    fn invalid_candidates_are_counted_out() {
        let compiled = CompiledSelector::compile(
            &FieldSelector::new("x", "h2").with_fallbacks(["[[", "  ", "a @href"]),
        );
        assert_eq!(compiled.usable_count(), 2);
    }

    #[test]
    fn css_attribute_selectors_are_not_mistaken_for_suffixes() {
        assert!(matches!(
            SelectorExpr::parse("a[data-x='1']").unwrap(),
            SelectorExpr::Text(_)
        ));
        assert!(matches!(
            SelectorExpr::parse("a.link @href").unwrap(),
            SelectorExpr::Attribute { scope: Some(_), .. }
        ));
    }
}
