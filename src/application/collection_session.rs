//! Collection Session
//!
//! Drives one (retailer, page type) scope across its ordered page list:
//! render, readiness check, extraction, then persistence in container
//! position order. Only configuration problems abort a run; page failures are
//! logged and skipped unless the page type is marked fail-fast, and record
//! persistence failures never stop the session.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::pacing::Pacer;
use crate::application::readiness::{PageReadinessGate, ReadinessVerdict};
use crate::domain::{
    CollectionError, CollectionResult, CollectionState, PageOutcome, PageRenderer, PageTarget,
    PersistOutcome, RecordSink, ScopeKey, SessionSummary, StopReason,
};
use crate::infrastructure::parsing::{PageExtractor, ParseContext, ParsingError};
use crate::infrastructure::{PageTypeConfig, SelectorRegistry};

/// Per-run knobs that are not part of the page-type profile
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub record_cap: u32,
    pub pacer: Pacer,
}

pub struct CollectionSession {
    scope: ScopeKey,
    extractor: PageExtractor,
    gate: PageReadinessGate,
    fail_fast: bool,
    pages: Vec<PageTarget>,
    options: SessionOptions,
    renderer: Arc<dyn PageRenderer>,
    sink: Arc<dyn RecordSink>,
}

fn profile_error(e: ParsingError) -> CollectionError {
    match e {
        ParsingError::InvalidProfile { field, reason } => CollectionError::configuration(&field, reason),
        other => CollectionError::configuration("profile", other.to_string()),
    }
}

impl CollectionSession {
    /// Resolve selectors and compile the page-type profile.
    ///
    /// Fails with a configuration error when the scope has no selectors, the
    /// page list is empty, the cap is zero, or the profile does not compile.
    pub fn new(
        registry: &SelectorRegistry,
        page_type: &PageTypeConfig,
        pages: Vec<PageTarget>,
        options: SessionOptions,
        renderer: Arc<dyn PageRenderer>,
        sink: Arc<dyn RecordSink>,
    ) -> CollectionResult<Self> {
        let profile = &page_type.profile;
        let selectors = registry.resolve(&profile.retailer, &profile.page_type)?;

        if pages.is_empty() {
            return Err(CollectionError::configuration(
                "pages",
                format!("page list for {} is empty", selectors.scope),
            ));
        }
        if options.record_cap == 0 {
            return Err(CollectionError::configuration("record_cap", "record cap must be greater than zero"));
        }

        let extractor = PageExtractor::new(profile.clone(), &selectors).map_err(profile_error)?;

        Ok(Self {
            scope: selectors.scope,
            extractor,
            gate: PageReadinessGate::new(page_type.readiness.clone()),
            fail_fast: page_type.fail_fast,
            pages,
            options,
            renderer,
            sink,
        })
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// Run until the cap is reached, the page list is exhausted, a fatal page
    /// failure occurs or the token is cancelled.
    pub async fn run(&self, cancellation_token: CancellationToken) -> SessionSummary {
        let mut state = CollectionState::new(self.scope.clone(), self.options.record_cap);
        info!(
            "Session {} started for {}: {} pages, cap {}, sink {}",
            state.session_id,
            self.scope,
            self.pages.len(),
            self.options.record_cap,
            self.sink.name()
        );

        let mut stop_reason = StopReason::PagesExhausted;
        for (index, target) in self.pages.iter().enumerate() {
            if cancellation_token.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            if state.cap_reached() {
                stop_reason = StopReason::CapReached;
                break;
            }

            match self.process_page(target, &mut state, &cancellation_token).await {
                PageOutcome::Completed {
                    page_number,
                    collected,
                    rejected,
                } => {
                    info!(
                        "Page {} done: {} collected, {} rejected ({}/{} total)",
                        page_number, collected, rejected, state.total_collected, state.record_cap
                    );
                }
                PageOutcome::Failed(error) => {
                    warn!("{}", error);
                    state.record_page(target.page_number, 0);
                    state.log_error(error.to_string());
                    if self.fail_fast {
                        warn!("Page failure is fatal for {}; stopping", self.scope);
                        stop_reason = StopReason::FatalPageFailure;
                        break;
                    }
                }
                PageOutcome::Abandoned { page_number } => {
                    info!("Page {} abandoned on cancellation", page_number);
                    stop_reason = StopReason::Cancelled;
                    break;
                }
            }

            if state.cap_reached() {
                stop_reason = StopReason::CapReached;
                break;
            }

            let has_next = index + 1 < self.pages.len();
            if has_next && !self.options.pacer.pause(&cancellation_token).await {
                stop_reason = StopReason::Cancelled;
                break;
            }
        }

        let summary = state.finish(stop_reason);
        if summary.is_partial() {
            warn!(
                "Session {} collected {}/{} records ({})",
                summary.session_id, summary.total_collected, summary.record_cap, summary.stop_reason
            );
        } else {
            info!(
                "Session {} collected {}/{} records",
                summary.session_id, summary.total_collected, summary.record_cap
            );
        }
        summary
    }

    async fn process_page(
        &self,
        target: &PageTarget,
        state: &mut CollectionState,
        cancellation_token: &CancellationToken,
    ) -> PageOutcome {
        let page_number = target.page_number;
        info!("Processing page {}: {}", page_number, target.url);

        let page = tokio::select! {
            rendered = self.renderer.render(&target.url) => match rendered {
                Ok(page) => page,
                Err(e) => {
                    return PageOutcome::Failed(CollectionError::render_failure(
                        page_number,
                        &target.url,
                        format!("{e:#}"),
                    ));
                }
            },
            _ = cancellation_token.cancelled() => return PageOutcome::Abandoned { page_number },
        };

        let verdict = tokio::select! {
            verdict = self.gate.await_ready(page.as_ref()) => verdict,
            _ = cancellation_token.cancelled() => return PageOutcome::Abandoned { page_number },
        };
        if let ReadinessVerdict::NotReady { reason, diagnostics } = verdict {
            return PageOutcome::Failed(CollectionError::ReadinessTimeout {
                page_number,
                reason,
                diagnostics,
            });
        }

        let source = match page.page_source().await {
            Ok(source) => source,
            Err(e) => {
                return PageOutcome::Failed(CollectionError::render_failure(
                    page_number,
                    &target.url,
                    format!("could not read page source: {e:#}"),
                ));
            }
        };

        let context = ParseContext::new(self.scope.clone(), page_number, target.url.clone());
        let extraction = self.extractor.extract(&source, &context);
        let rejected = u32::try_from(extraction.rejections.len()).unwrap_or(u32::MAX);
        state.rejections += rejected;
        if rejected > 0 {
            warn!(
                "Page {}: {} containers rejected ({})",
                page_number,
                rejected,
                extraction
                    .rejections
                    .iter()
                    .map(|r| r.reason.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        let mut collected = 0;
        for (index, record) in extraction.records.iter().enumerate() {
            if state.cap_reached() {
                debug!(
                    "Record cap reached; leaving {} records on page {}",
                    extraction.records.len() - index,
                    page_number
                );
                break;
            }

            match self.sink.persist(record, &self.scope).await {
                Ok(PersistOutcome::Inserted) => {
                    state.record_collected();
                    collected += 1;
                }
                Ok(PersistOutcome::InsertedMirrorFailed(source)) => {
                    state.record_collected();
                    collected += 1;
                    let error = CollectionError::Persist {
                        page_number,
                        position: record.position,
                        source,
                    };
                    state.log_error(error.to_string());
                }
                Ok(PersistOutcome::SkippedDuplicate) => {
                    debug!("Duplicate '{}' at position {}", record.record_key, record.position);
                    state.duplicates_skipped += 1;
                }
                Err(source) => {
                    let error = CollectionError::Persist {
                        page_number,
                        position: record.position,
                        source,
                    };
                    warn!("{}", error);
                    state.log_error(error.to_string());
                }
            }
        }

        state.record_page(page_number, collected);
        PageOutcome::Completed {
            page_number,
            collected,
            rejected,
        }
    }
}
