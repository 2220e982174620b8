//! Container Discovery & Filter
//!
//! Locates candidate product containers, drops the ones carrying a
//! non-product signature, orders survivors by their positional attribute and
//! truncates to the page size.

use scraper::ElementRef;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::config::PageProfile;
use super::extractor::CompiledSelector;

/// One structural subtree presumed to be a product listing
#[derive(Debug, Clone)]
pub struct RawContainer<'a> {
    pub element: ElementRef<'a>,
    /// Order in which the base selector produced this container
    pub discovery_index: usize,
    /// Parsed positional attribute, when present and numeric
    pub position: Option<i64>,
    pub attrs: HashMap<String, String>,
}

impl<'a> RawContainer<'a> {
    pub fn new(element: ElementRef<'a>, discovery_index: usize, position_attribute: Option<&str>) -> Self {
        let attrs: HashMap<String, String> = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let position = position_attribute
            .and_then(|name| attrs.get(name))
            .and_then(|value| value.trim().parse::<i64>().ok());

        Self {
            element,
            discovery_index,
            position,
            attrs,
        }
    }
}

/// Containers surviving discovery plus bookkeeping for diagnostics
#[derive(Debug)]
pub struct Discovery<'a> {
    pub containers: Vec<RawContainer<'a>>,
    pub raw_count: usize,
    pub excluded_count: usize,
    pub truncated_count: usize,
}

pub struct ContainerDiscovery<'p> {
    profile: &'p PageProfile,
}

impl<'p> ContainerDiscovery<'p> {
    pub fn new(profile: &'p PageProfile) -> Self {
        Self { profile }
    }

    /// Find, filter, order and truncate containers under `root`.
    ///
    /// Base selector candidates are tried in order; the first one that
    /// matches anything defines the raw candidate list.
    pub fn discover<'a>(&self, root: ElementRef<'a>, base_selector: &CompiledSelector) -> Discovery<'a> {
        let raw: Vec<RawContainer<'a>> = base_selector
            .element_selectors()
            .map(|selector| root.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                RawContainer::new(element, index, self.profile.position_attribute.as_deref())
            })
            .collect();

        let raw_count = raw.len();
        let (mut retained, excluded) = self.partition(raw);
        let excluded_count = excluded.len();

        order_by_position(&mut retained);

        let max = self.profile.max_containers_per_page;
        let truncated_count = retained.len().saturating_sub(max);
        retained.truncate(max);

        debug!(
            "Discovered {} containers: {} excluded, {} truncated, {} kept",
            raw_count,
            excluded_count,
            truncated_count,
            retained.len()
        );

        if let Some(threshold) = self.profile.warn_below_containers {
            if retained.len() < threshold {
                warn!(
                    "Only {} valid containers found (expected at least {}; raw {}, excluded {})",
                    retained.len(),
                    threshold,
                    raw_count,
                    excluded_count
                );
            }
        }

        Discovery {
            containers: retained,
            raw_count,
            excluded_count,
            truncated_count,
        }
    }

    /// Split containers into (retained, excluded). Every input lands in
    /// exactly one side and relative order is preserved on both.
    pub fn partition<'a>(
        &self,
        containers: Vec<RawContainer<'a>>,
    ) -> (Vec<RawContainer<'a>>, Vec<RawContainer<'a>>) {
        containers
            .into_iter()
            .partition(|container| !self.is_excluded(&container.attrs))
    }

    pub fn is_excluded(&self, attrs: &HashMap<String, String>) -> bool {
        self.profile
            .exclusion_signatures
            .iter()
            .any(|signature| signature.matches(attrs))
    }
}

/// Stable sort by positional attribute; containers without one go last and
/// ties keep discovery order.
fn order_by_position(containers: &mut [RawContainer<'_>]) {
    containers.sort_by_key(|c| (c.position.is_none(), c.position.unwrap_or_default(), c.discovery_index));
}
