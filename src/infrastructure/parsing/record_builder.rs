//! Record Builder
//!
//! Maps one surviving container through the page's selectors, normalizes
//! each field by its configured kind and validates the required set.
//! Rejections are expected outcomes for ads and malformed containers that
//! slipped past discovery; they are reported, never raised.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

use super::config::{FieldKind, PageProfile};
use super::container_discovery::RawContainer;
use super::context::ParseContext;
use super::extractor::{CompiledSelector, SafeFieldExtractor};
use crate::domain::{CandidateRecord, FieldValue, Rejection, ValidRecord};

lazy_static! {
    static ref LEADING_NUMBER: Regex = Regex::new(r"^\D*?(\d[\d,]*)$").unwrap();
}

pub struct RecordBuilder<'p> {
    profile: &'p PageProfile,
    selectors: &'p [CompiledSelector],
}

impl<'p> RecordBuilder<'p> {
    pub fn new(profile: &'p PageProfile, selectors: &'p [CompiledSelector]) -> Self {
        Self { profile, selectors }
    }

    /// Build the candidate record for one container.
    ///
    /// `position` is the container's 1-based rank among the page's survivors.
    pub fn build(&self, container: &RawContainer<'_>, position: u32, context: &ParseContext) -> CandidateRecord {
        let fields: BTreeMap<String, Option<FieldValue>> = self
            .selectors
            .iter()
            .map(|selector| {
                let value = self.extract_field(container, selector);
                (selector.field_name.clone(), value)
            })
            .collect();

        CandidateRecord {
            scope: context.scope.clone(),
            page_number: context.page_number,
            position,
            fields,
            container_attrs: container.attrs.clone(),
        }
    }

    /// Build and validate in one step
    pub fn build_valid(
        &self,
        container: &RawContainer<'_>,
        position: u32,
        context: &ParseContext,
    ) -> Result<ValidRecord, Rejection> {
        let candidate = self.build(container, position, context);
        candidate.promote(&self.profile.required_fields, &self.profile.identity_fields)
    }

    fn extract_field(&self, container: &RawContainer<'_>, selector: &CompiledSelector) -> Option<FieldValue> {
        let kind = self.profile.kind_of(&selector.field_name);

        if let FieldKind::Presence { present, absent } = kind {
            let label = if SafeFieldExtractor::is_present(&container.element, selector) {
                present
            } else {
                absent
            };
            return Some(FieldValue::Text(label.clone()));
        }

        let raw = SafeFieldExtractor::extract(&container.element, selector)?;
        let value = normalize(kind, &raw, &self.profile.origin);
        if value.is_none() {
            debug!(
                "Field '{}' value {:?} dropped by {:?} normalization",
                selector.field_name, raw, kind
            );
        }
        value
    }
}

/// Apply a field kind's normalization to an extracted value
pub fn normalize(kind: &FieldKind, raw: &str, origin: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => normalize_text(raw).map(FieldValue::Text),
        FieldKind::Rank => normalize_rank(raw).map(FieldValue::Integer),
        FieldKind::Url => absolutize_url(raw, origin).map(FieldValue::Text),
        FieldKind::Price => normalize_price(raw).map(FieldValue::Text),
        FieldKind::Badge { allowed } => normalize_badge(raw, allowed).map(FieldValue::Text),
        // Presence never reaches text normalization
        FieldKind::Presence { .. } => None,
    }
}

pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `#1` -> 1, `No. 12` -> 12, `1,204` -> 1204. Only a leading marker is
/// stripped: anything after the number makes the value absent.
pub fn normalize_rank(raw: &str) -> Option<i64> {
    let captures = LEADING_NUMBER.captures(raw.trim())?;
    captures[1].replace(',', "").parse().ok()
}

/// Keep values that already carry a scheme; otherwise join onto `origin`
/// by plain concatenation so the path and query are preserved verbatim.
pub fn absolutize_url(raw: &str, origin: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if Url::parse(value).is_ok() {
        return Some(value.to_string());
    }

    if let Some(rest) = value.strip_prefix("//") {
        let scheme = Url::parse(origin).map(|u| u.scheme().to_string()).unwrap_or_else(|_| "https".to_string());
        return Some(format!("{scheme}://{rest}"));
    }

    let origin = origin.trim_end_matches('/');
    if value.starts_with('/') {
        Some(format!("{origin}{value}"))
    } else {
        Some(format!("{origin}/{value}"))
    }
}

/// Collapse internal whitespace; values without any digit are not prices
pub fn normalize_price(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .any(|c| c.is_ascii_digit())
        .then_some(collapsed)
}

/// Only allow-listed labels survive
pub fn normalize_badge(raw: &str, allowed: &[String]) -> Option<String> {
    let value = raw.trim();
    allowed
        .iter()
        .find(|label| label.as_str() == value)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldSelector, ScopeKey};
    use scraper::{Html, Selector};

    #[test]
    fn rank_strips_leading_markers() {
        assert_eq!(normalize_rank("#1"), Some(1));
        assert_eq!(normalize_rank("  #27 "), Some(27));
        assert_eq!(normalize_rank("No. 1,204"), Some(1204));
        assert_eq!(normalize_rank("#"), None);
        assert_eq!(normalize_rank("unranked"), None);
    }

    #[test]
    fn rank_with_trailing_text_is_absent() {
        assert_eq!(normalize_rank("12abc"), None);
        assert_eq!(normalize_rank("Top 100 sellers"), None);
        assert_eq!(normalize_rank("#3 in TVs"), None);
    }

    #[test]
    fn url_joins_relative_paths_exactly() {
        assert_eq!(
            absolutize_url("/dp/ABC123", "https://example.com").as_deref(),
            Some("https://example.com/dp/ABC123")
        );
        assert_eq!(
            absolutize_url("/dp/ABC123", "https://example.com/").as_deref(),
            Some("https://example.com/dp/ABC123")
        );
        assert_eq!(
            absolutize_url("site/x?a=1", "https://www.bestbuy.com").as_deref(),
            Some("https://www.bestbuy.com/site/x?a=1")
        );
        assert_eq!(
            absolutize_url("//cdn.example.com/x", "https://example.com").as_deref(),
            Some("https://cdn.example.com/x")
        );
    }

    #[test]
    fn url_with_scheme_passes_through_unchanged() {
        let absolute = "https://other.example/dp/X?ref=sr_1_1";
        assert_eq!(absolutize_url(absolute, "https://example.com").as_deref(), Some(absolute));
    }

    #[test]
    fn badge_keeps_only_allow_listed_values() {
        let allowed = vec!["Limited time deal".to_string()];
        assert_eq!(
            normalize_badge(" Limited time deal ", &allowed).as_deref(),
            Some("Limited time deal")
        );
        assert_eq!(normalize_badge("Save 5% with coupon", &allowed), None);
    }

    #[test]
    fn price_collapses_whitespace_and_requires_digits() {
        assert_eq!(normalize_price("$1,299\n .99").as_deref(), Some("$1,299 .99"));
        assert_eq!(normalize_price("See price in cart"), None);
    }

    #[test]
    fn builds_and_validates_record_from_container() {
        let html = Html::parse_document(
            r#"<div class="item" data-asin="B01" data-index="4">
                <h2><a href="/dp/B01"><span>Roku TV</span></a></h2>
                <span class="badge">Limited time deal</span>
                <div class="sponsored"></div>
            </div>"#,
        );
        let element = html.select(&Selector::parse("div.item").unwrap()).next().unwrap();
        let container = RawContainer::new(element, 0, Some("data-index"));

        let profile = PageProfile::new("Amazon", "main_page", "https://www.amazon.com", 16)
            .with_required("product_name")
            .with_identity("asin")
            .with_kind("product_url", FieldKind::Url)
            .with_kind(
                "deal_badge",
                FieldKind::Badge { allowed: vec!["Limited time deal".to_string()] },
            )
            .with_kind(
                "sku_status",
                FieldKind::Presence { present: "Sponsored".to_string(), absent: "Regular".to_string() },
            );

        let selectors: Vec<CompiledSelector> = [
            FieldSelector::new("product_name", "h2 span"),
            FieldSelector::new("product_url", "h2 a @href"),
            FieldSelector::new("deal_badge", "span.badge"),
            FieldSelector::new("sku_status", "div.sponsored"),
            FieldSelector::new("asin", "@data-asin"),
        ]
        .iter()
        .map(CompiledSelector::compile)
        .collect();

        let context = ParseContext::new(ScopeKey::new("Amazon", "main_page"), 2, "https://www.amazon.com/s?page=2");
        let record = RecordBuilder::new(&profile, &selectors)
            .build_valid(&container, 1, &context)
            .unwrap();

        assert_eq!(record.text("product_url"), Some("https://www.amazon.com/dp/B01"));
        assert_eq!(record.text("deal_badge"), Some("Limited time deal"));
        assert_eq!(record.text("sku_status"), Some("Sponsored"));
        assert_eq!(record.record_key, "B01");
        assert_eq!(record.page_number, 2);
    }
}
