//! Shared fixtures for integration tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shelfwatch_lib::domain::{FieldSelector, PageDiagnostics, PageHandle, PageRenderer};
use shelfwatch_lib::infrastructure::parsing::{ExclusionSignature, FieldKind, MatchMode, PageProfile};
use shelfwatch_lib::infrastructure::{PageTypeConfig, ReadinessConfig, SelectorEntry, SelectorRegistry, StaticPage};

pub const RETAILER: &str = "Amazon";
pub const PAGE_TYPE: &str = "main_page";
pub const ORIGIN: &str = "https://www.amazon.com";

/// One listing card in the fixture grid
#[derive(Debug, Clone)]
pub struct Card {
    pub asin: String,
    pub index: usize,
    pub name: Option<String>,
    pub sponsored_carousel: bool,
    pub sponsored_label: bool,
}

impl Card {
    pub fn product(asin: &str, index: usize) -> Self {
        Self {
            asin: asin.to_string(),
            index,
            name: Some(format!("Product {asin}")),
            sponsored_carousel: false,
            sponsored_label: false,
        }
    }

    fn render(&self) -> String {
        let component = if self.sponsored_carousel {
            "sp-sponsored-result"
        } else {
            "s-search-result"
        };
        let name = self
            .name
            .as_ref()
            .map(|n| format!(r#"<h2><a href="/dp/{}"><span> {} </span></a></h2>"#, self.asin, n))
            .unwrap_or_else(|| format!(r#"<h2><a href="/dp/{}"><span>   </span></a></h2>"#, self.asin));
        let label = if self.sponsored_label {
            r#"<span class="puis-label-popover-default">Sponsored</span>"#
        } else {
            ""
        };

        format!(
            r#"<div class="s-result-item s-asin" data-asin="{asin}" data-index="{index}" data-component-type="{component}">
                {label}{name}
                <span class="a-price"><span class="a-offscreen">$ {index}.99</span></span>
                <span class="badge">{badge}</span>
            </div>"#,
            asin = self.asin,
            index = self.index,
            badge = if self.index % 2 == 0 { "Best Seller" } else { "Editor's pick" },
        )
    }
}

pub fn listing_page(cards: &[Card]) -> String {
    let body: String = cards.iter().map(Card::render).collect();
    format!(
        r#"<html><head><title>Amazon.com : headphones</title></head>
        <body><div class="s-main-slot">{body}</div></body></html>"#
    )
}

/// Cards numbered `first..first + count`, all valid products
pub fn products(prefix: &str, first: usize, count: usize) -> Vec<Card> {
    (first..first + count)
        .map(|i| Card::product(&format!("{prefix}{i:03}"), i))
        .collect()
}

/// 16 raw containers: 2 sponsored carousels, 1 card without a name
pub fn sixteen_card_page() -> String {
    let mut cards = products("B0", 1, 16);
    cards[3].sponsored_carousel = true;
    cards[9].sponsored_carousel = true;
    cards[6].name = None;
    cards[1].sponsored_label = true;
    listing_page(&cards)
}

pub fn profile() -> PageProfile {
    PageProfile::new(RETAILER, PAGE_TYPE, ORIGIN, 16)
        .with_exclusion(ExclusionSignature::new(
            "data-component-type",
            MatchMode::Exact,
            "sp-sponsored-result",
        ))
        .with_exclusion(ExclusionSignature::new("class", MatchMode::Substring, "AdHolder"))
        .with_position_attribute("data-index")
        .with_required("product_name")
        .with_identity("asin")
        .with_kind("product_url", FieldKind::Url)
        .with_kind("price", FieldKind::Price)
        .with_kind(
            "badge",
            FieldKind::Badge {
                allowed: vec!["Best Seller".to_string(), "Amazon's Choice".to_string()],
            },
        )
        .with_kind(
            "sponsored",
            FieldKind::Presence {
                present: "Sponsored".to_string(),
                absent: "Regular".to_string(),
            },
        )
}

pub fn page_type_config(readiness: ReadinessConfig, fail_fast: bool) -> PageTypeConfig {
    PageTypeConfig {
        profile: profile(),
        readiness,
        fail_fast,
    }
}

pub fn quick_readiness() -> ReadinessConfig {
    ReadinessConfig {
        marker_selectors: vec![".s-main-slot".to_string()],
        marker_attempts: 2,
        poll_interval_ms: 1,
        max_scroll_attempts: 2,
        settle_delay_ms: 1,
        pending_attempts: 2,
        ..ReadinessConfig::default()
    }
}

pub fn selector_entries() -> Vec<SelectorEntry> {
    let entry = |field: &str, primary: &str, fallbacks: &[&str]| SelectorEntry {
        retailer: RETAILER.to_string(),
        page_type: PAGE_TYPE.to_string(),
        selector: FieldSelector::new(field, primary)
            .with_fallbacks(fallbacks.iter().copied()),
    };

    vec![
        entry("base_container", "div.s-main-slot div.s-result-item", &["div[data-asin]"]),
        entry("asin", "@data-asin", &[]),
        entry("product_name", "h2 a span", &["h2"]),
        entry("product_url", "h2 a @href", &[]),
        entry("price", "span.a-price span.a-offscreen", &[]),
        entry("badge", "span.badge", &[]),
        entry("sponsored", "span.puis-label-popover-default", &[]),
    ]
}

pub fn registry() -> SelectorRegistry {
    SelectorRegistry::from_entries(selector_entries()).expect("fixture selectors are unique")
}

/// Page whose height follows a script: each scroll advances one step
pub struct ScriptedPage {
    url: String,
    heights: Vec<u64>,
    step: AtomicUsize,
    source: String,
}

impl ScriptedPage {
    pub fn new(url: &str, heights: Vec<u64>, source: String) -> Self {
        Self {
            url: url.to_string(),
            heights,
            step: AtomicUsize::new(0),
            source,
        }
    }

    fn current_height(&self) -> u64 {
        let step = self.step.load(Ordering::SeqCst);
        let last = self.heights.len().saturating_sub(1);
        self.heights.get(step.min(last)).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PageHandle for ScriptedPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn page_source(&self) -> Result<String> {
        Ok(format!("{}<!-- {} -->", self.source, self.current_height()))
    }

    async fn scroll_height(&self) -> Result<u64> {
        Ok(self.current_height())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.step.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        StaticPage::new(self.url.clone(), self.source.clone())
            .has_element(selector)
            .await
    }

    async fn diagnostics(&self) -> PageDiagnostics {
        PageDiagnostics {
            url: self.url.clone(),
            title: Some("scripted".to_string()),
            snapshot: None,
        }
    }
}

/// What the fixture renderer does for one URL
#[derive(Clone)]
pub enum PageScript {
    Static(String),
    Heights(Vec<u64>, String),
    Fail(String),
    /// Never finishes rendering
    Stall,
}

/// Renderer that serves scripted pages and counts render calls
#[derive(Default)]
pub struct FixtureRenderer {
    pages: HashMap<String, PageScript>,
    pub renders: AtomicUsize,
}

impl FixtureRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, script: PageScript) -> Self {
        self.pages.insert(url.to_string(), script);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for FixtureRenderer {
    async fn render(&self, url: &str) -> Result<Box<dyn PageHandle>> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(PageScript::Static(source)) => Ok(Box::new(StaticPage::new(url, source.clone()))),
            Some(PageScript::Heights(heights, source)) => {
                Ok(Box::new(ScriptedPage::new(url, heights.clone(), source.clone())))
            }
            Some(PageScript::Fail(reason)) => Err(anyhow!("navigation failed: {}", reason)),
            Some(PageScript::Stall) => std::future::pending().await,
            None => Err(anyhow!("no fixture for {}", url)),
        }
    }
}
