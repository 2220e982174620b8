//! Page Readiness Gate
//!
//! Decides whether a rendered page has loaded enough to be worth extracting.
//! Checks run in order: marker presence, lazy-load stabilization, pending
//! loader markers. Every wait is bounded by an attempt budget, and the gate
//! never fails: problems become a `NotReady` verdict with diagnostics.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::{PageDiagnostics, PageHandle};
use crate::infrastructure::ReadinessConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessVerdict {
    Ready {
        /// Two consecutive samples matched before the budget ran out
        stabilized: bool,
        height: u64,
    },
    NotReady {
        reason: String,
        diagnostics: PageDiagnostics,
    },
}

impl ReadinessVerdict {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// One stabilization sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    height: u64,
    content_hash: [u8; 32],
}

pub struct PageReadinessGate {
    config: ReadinessConfig,
}

impl PageReadinessGate {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    pub async fn await_ready(&self, page: &dyn PageHandle) -> ReadinessVerdict {
        match self.check(page).await {
            Ok(verdict) => verdict,
            Err(reason) => {
                let diagnostics = page.diagnostics().await;
                warn!(
                    "Page not ready: {} (url: {}, title: {:?}, snapshot: {:?})",
                    reason, diagnostics.url, diagnostics.title, diagnostics.snapshot
                );
                ReadinessVerdict::NotReady { reason, diagnostics }
            }
        }
    }

    async fn check(&self, page: &dyn PageHandle) -> Result<ReadinessVerdict, String> {
        self.wait_for_markers(page).await?;
        let (stabilized, height) = self.stabilize(page).await?;
        self.wait_for_pending(page).await?;

        if let Err(e) = page.scroll_to_top().await {
            debug!("Scroll to top failed on {}: {}", page.url(), e);
        }

        if stabilized {
            info!("Page ready: {} (height {})", page.url(), height);
        } else {
            warn!(
                "Page {} did not stabilize within {} scroll attempts; extracting anyway (height {})",
                page.url(),
                self.config.max_scroll_attempts,
                height
            );
        }
        Ok(ReadinessVerdict::Ready { stabilized, height })
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    async fn any_present(page: &dyn PageHandle, selectors: &[String]) -> bool {
        for selector in selectors {
            match page.has_element(selector).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => debug!("Marker '{}' check failed: {}", selector, e),
            }
        }
        false
    }

    async fn wait_for_markers(&self, page: &dyn PageHandle) -> Result<(), String> {
        let markers = &self.config.marker_selectors;
        if markers.is_empty() {
            return Ok(());
        }

        let attempts = self.config.marker_attempts.max(1);
        for attempt in 1..=attempts {
            if Self::any_present(page, markers).await {
                debug!("Marker found on attempt {}", attempt);
                return Ok(());
            }
            if attempt < attempts {
                sleep(self.poll_interval()).await;
            }
        }

        Err(format!(
            "none of the marker elements {:?} appeared after {} attempts",
            markers, attempts
        ))
    }

    async fn sample(page: &dyn PageHandle) -> Result<Sample, String> {
        let height = page
            .scroll_height()
            .await
            .map_err(|e| format!("could not measure content height: {e}"))?;
        let source = page
            .page_source()
            .await
            .map_err(|e| format!("could not read page source: {e}"))?;

        Ok(Sample {
            height,
            content_hash: *blake3::hash(source.as_bytes()).as_bytes(),
        })
    }

    /// Scroll and resample until two consecutive samples match at or above the
    /// minimum height. Returns whether that happened and the last height seen.
    async fn stabilize(&self, page: &dyn PageHandle) -> Result<(bool, u64), String> {
        let min_height = self.config.min_content_height;
        let settle = Duration::from_millis(self.config.settle_delay_ms);
        let mut previous = Self::sample(page).await?;

        for attempt in 1..=self.config.max_scroll_attempts {
            if let Err(e) = page.scroll_to_bottom().await {
                debug!("Scroll to bottom failed on attempt {}: {}", attempt, e);
            }
            sleep(settle).await;

            let current = Self::sample(page).await?;
            debug!(
                "Stabilization attempt {}: height {} -> {}",
                attempt, previous.height, current.height
            );

            if current == previous && current.height >= min_height {
                return Ok((true, current.height));
            }
            previous = current;
        }

        if previous.height < min_height {
            return Err(format!(
                "content height {} stayed below minimum {} after {} scroll attempts",
                previous.height, min_height, self.config.max_scroll_attempts
            ));
        }
        Ok((false, previous.height))
    }

    async fn wait_for_pending(&self, page: &dyn PageHandle) -> Result<(), String> {
        let pending = &self.config.pending_markers;
        if pending.is_empty() {
            return Ok(());
        }

        let attempts = self.config.pending_attempts.max(1);
        for attempt in 1..=attempts {
            if !Self::any_present(page, pending).await {
                return Ok(());
            }
            if attempt < attempts {
                sleep(self.poll_interval()).await;
            }
        }

        Err(format!("loading markers {:?} still present after {} attempts", pending, attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::StaticPage;

    const PAGE: &str = r#"<html><head><title>Listing</title></head><body>
        <div class="s-main-slot"><div class="s-result-item">A</div></div>
        <div class="spinner"></div>
    </body></html>"#;

    fn config() -> ReadinessConfig {
        ReadinessConfig {
            poll_interval_ms: 10,
            settle_delay_ms: 10,
            ..ReadinessConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn static_page_with_marker_is_ready_and_stable() {
        let gate = PageReadinessGate::new(ReadinessConfig {
            min_content_height: 10,
            marker_selectors: vec![".missing".into(), ".s-main-slot".into()],
            ..config()
        });

        let verdict = gate.await_ready(&StaticPage::new("https://shop.test/s", PAGE)).await;
        assert_eq!(
            verdict,
            ReadinessVerdict::Ready {
                stabilized: true,
                height: PAGE.len() as u64
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_marker_is_not_ready_with_diagnostics() {
        let gate = PageReadinessGate::new(ReadinessConfig {
            marker_selectors: vec!["#gridItemRoot".into()],
            marker_attempts: 3,
            ..config()
        });

        match gate.await_ready(&StaticPage::new("https://shop.test/s", PAGE)).await {
            ReadinessVerdict::NotReady { reason, diagnostics } => {
                assert!(reason.contains("#gridItemRoot"));
                assert_eq!(diagnostics.url, "https://shop.test/s");
                assert_eq!(diagnostics.title.as_deref(), Some("Listing"));
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn short_page_is_not_ready() {
        let gate = PageReadinessGate::new(ReadinessConfig {
            min_content_height: 1_000_000,
            ..config()
        });

        let verdict = gate.await_ready(&StaticPage::new("https://shop.test/s", PAGE)).await;
        assert!(!verdict.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn lingering_loader_is_not_ready() {
        let gate = PageReadinessGate::new(ReadinessConfig {
            pending_markers: vec![".spinner".into()],
            pending_attempts: 2,
            ..config()
        });

        let verdict = gate.await_ready(&StaticPage::new("https://shop.test/s", PAGE)).await;
        assert!(matches!(verdict, ReadinessVerdict::NotReady { reason, .. } if reason.contains(".spinner")));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_scroll_budget_is_ready_but_unstabilized() {
        let gate = PageReadinessGate::new(ReadinessConfig {
            max_scroll_attempts: 0,
            ..config()
        });

        let verdict = gate.await_ready(&StaticPage::new("https://shop.test/s", PAGE)).await;
        assert!(matches!(verdict, ReadinessVerdict::Ready { stabilized: false, .. }));
    }
}
