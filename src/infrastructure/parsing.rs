//! HTML extraction pipeline
//!
//! Container discovery, safe field extraction and record building, driven
//! entirely by a `PageProfile` and a resolved `SelectorSet`.

pub mod config;
pub mod container_discovery;
pub mod context;
pub mod error;
pub mod extractor;
pub mod record_builder;

pub use config::{ExclusionSignature, FieldKind, MatchMode, PageProfile};
pub use container_discovery::{ContainerDiscovery, Discovery, RawContainer};
pub use context::ParseContext;
pub use error::{ParsingError, ParsingResult};
pub use extractor::{CompiledSelector, SafeFieldExtractor, SelectorExpr};
pub use record_builder::RecordBuilder;

use scraper::Html;
use tracing::{debug, info};

use crate::domain::{Rejection, SelectorSet, ValidRecord};

/// Parser that needs per-page context
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> Self::Output;
}

/// Everything extracted from one page
#[derive(Debug, Default)]
pub struct PageExtraction {
    /// Valid records in container position order
    pub records: Vec<ValidRecord>,
    pub rejections: Vec<Rejection>,
    pub raw_count: usize,
    pub excluded_count: usize,
    pub truncated_count: usize,
}

/// Profile and selectors compiled once per session
#[derive(Debug, Clone)]
pub struct PageExtractor {
    profile: PageProfile,
    base_container: CompiledSelector,
    fields: Vec<CompiledSelector>,
}

impl PageExtractor {
    /// Compile a profile with its selector set.
    ///
    /// Fails when the profile is inconsistent, when no base container
    /// selector can match elements, or when a required field has no selector.
    pub fn new(profile: PageProfile, selectors: &SelectorSet) -> ParsingResult<Self> {
        profile.validate()?;

        let base_container = CompiledSelector::compile(&selectors.base_container);
        if base_container.element_selectors().next().is_none() {
            return Err(ParsingError::InvalidProfile {
                field: selectors.base_container.field_name.clone(),
                reason: "no usable element selector for product containers".to_string(),
            });
        }

        for required in &profile.required_fields {
            if selectors.field(required).is_none() {
                return Err(ParsingError::InvalidProfile {
                    field: required.clone(),
                    reason: "required field has no selector".to_string(),
                });
            }
        }

        let fields = selectors.fields.iter().map(CompiledSelector::compile).collect();

        Ok(Self {
            profile,
            base_container,
            fields,
        })
    }

    pub fn profile(&self) -> &PageProfile {
        &self.profile
    }

    /// Parse page source and extract records
    pub fn extract(&self, source: &str, context: &ParseContext) -> PageExtraction {
        let document = Html::parse_document(source);
        self.parse_with_context(&document, context)
    }
}

impl ContextualParser for PageExtractor {
    type Output = PageExtraction;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &ParseContext) -> PageExtraction {
        let discovery = ContainerDiscovery::new(&self.profile).discover(html.root_element(), &self.base_container);
        let builder = RecordBuilder::new(&self.profile, &self.fields);

        let mut extraction = PageExtraction {
            raw_count: discovery.raw_count,
            excluded_count: discovery.excluded_count,
            truncated_count: discovery.truncated_count,
            ..PageExtraction::default()
        };

        for (index, container) in discovery.containers.iter().enumerate() {
            let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
            match builder.build_valid(container, position, context) {
                Ok(record) => extraction.records.push(record),
                Err(rejection) => {
                    debug!("Rejected container on {}: {}", context.url, rejection);
                    extraction.rejections.push(rejection);
                }
            }
        }

        info!(
            "Page {} ({}): {} containers, {} excluded, {} valid, {} rejected",
            context.page_number,
            context.url,
            extraction.raw_count,
            extraction.excluded_count,
            extraction.records.len(),
            extraction.rejections.len()
        );

        extraction
    }
}
