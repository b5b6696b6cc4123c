use tracing::{debug, warn};

use crate::config::StageSelectors;
use crate::extract::{self, StageMetrics};
use crate::fetch::PageFetcher;

/// How far to probe and what to do when a stage page comes back empty.
#[derive(Debug, Clone)]
pub struct StagePolicy {
    pub max_stage: Option<u32>,
    pub fill_missing: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoveredStage {
    pub number: u32,
    pub metrics: StageMetrics,
    pub copied_from: Option<u32>,
}

/// Swap the trailing numeric path segment for the probe number. A trailing
/// slash survives; a URL without a numeric tail gets the number appended.
pub fn stage_url(engine_url: &str, stage: u32) -> String {
    let (body, slash) = match engine_url.strip_suffix('/') {
        Some(b) => (b, "/"),
        None => (engine_url, ""),
    };
    match body.rsplit_once('/') {
        Some((head, last)) if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) => {
            format!("{head}/{stage}{slash}")
        }
        _ => format!("{body}/{stage}{slash}"),
    }
}

/// Probe stage pages in order, starting at 1. An extracted page advances the
/// probe. An empty page ends the sequence, unless fill-missing is on and an
/// extracted stage exists to copy from, in which case a synthesized copy is
/// appended and probing continues. A page that fails to load counts as empty.
pub async fn discover_stages<F: PageFetcher>(
    fetcher: &F,
    engine_url: &str,
    selectors: &StageSelectors,
    policy: &StagePolicy,
) -> Vec<DiscoveredStage> {
    let mut stages: Vec<DiscoveredStage> = Vec::new();
    let mut last_valid: Option<usize> = None;
    let mut number = 1u32;

    loop {
        if let Some(max) = policy.max_stage {
            if number > max {
                break;
            }
        }

        let url = stage_url(engine_url, number);
        let metrics = match fetcher.fetch(&url).await {
            Ok(html) => match extract::parse_stage_page(&html, selectors) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Stage {} extraction failed for {}: {}", number, url, e);
                    StageMetrics::default()
                }
            },
            Err(e) => {
                warn!("Stage {} unreachable at {}: {}", number, url, e);
                StageMetrics::default()
            }
        };

        if metrics.is_empty() {
            match last_valid {
                Some(idx) if policy.fill_missing => {
                    debug!("Stage {} empty, copying forward from stage {}", number, number - 1);
                    stages.push(DiscoveredStage {
                        number,
                        metrics: stages[idx].metrics.clone(),
                        copied_from: Some(number - 1),
                    });
                }
                _ => break,
            }
        } else {
            debug!("Stage {} extracted from {}", number, url);
            last_valid = Some(stages.len());
            stages.push(DiscoveredStage { number, metrics, copied_from: None });
        }
        number += 1;
    }

    stages
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::FetchError;

    struct MapFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(pages: Vec<(&str, String)>) -> Self {
            Self {
                pages: pages.into_iter().map(|(u, h)| (u.to_string(), h)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Navigation {
                url: url.to_string(),
                reason: "not mapped".into(),
            })
        }
    }

    fn stage_html(stock_hp: i64, tuned_hp: i64, stock_nm: i64, tuned_nm: i64) -> String {
        format!(
            r#"<html><body>
            <h2>Vermogen</h2><div class="improvement"></div>
            <div class="progress">
              <div class="progress-bar"><span>{stock_hp} PK →</span></div>
              <div class="progress-bar"><span>{tuned_hp} PK</span></div>
            </div>
            <h2>Koppel</h2><div class="improvement"></div>
            <div class="progress">
              <div class="progress-bar"><span>{stock_nm} Nm →</span></div>
              <div class="progress-bar"><span>{tuned_nm} Nm</span></div>
            </div>
            </body></html>"#
        )
    }

    fn empty_html() -> String {
        "<html><body><h2>Binnenkort beschikbaar</h2></body></html>".to_string()
    }

    const ENGINE_URL: &str = "https://site/bmw/3-serie/g20/320d/1";

    #[test]
    fn stage_url_replaces_numeric_tail() {
        assert_eq!(stage_url("https://site/a/b/1", 2), "https://site/a/b/2");
        assert_eq!(stage_url("https://site/a/b/1/", 3), "https://site/a/b/3/");
        assert_eq!(stage_url("https://site/a/b/12", 1), "https://site/a/b/1");
        assert_eq!(stage_url("https://site/a/b", 2), "https://site/a/b/2");
    }

    #[tokio::test]
    async fn stops_at_first_empty_without_fill() {
        let fetcher = MapFetcher::new(vec![
            ("https://site/bmw/3-serie/g20/320d/1", stage_html(190, 220, 400, 450)),
            ("https://site/bmw/3-serie/g20/320d/2", stage_html(190, 240, 400, 480)),
            ("https://site/bmw/3-serie/g20/320d/3", empty_html()),
            ("https://site/bmw/3-serie/g20/320d/4", stage_html(190, 260, 400, 500)),
        ]);
        let policy = StagePolicy { max_stage: None, fill_missing: false };
        let stages =
            discover_stages(&fetcher, ENGINE_URL, &StageSelectors::default(), &policy).await;

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].number, 2);
        // Stage 4 exists but must never be probed past the empty stage 3
        let calls = fetcher.calls.lock().unwrap();
        assert!(!calls.iter().any(|u| u.ends_with("/4")));
    }

    #[tokio::test]
    async fn cap_limits_probing() {
        let fetcher = MapFetcher::new(vec![
            ("https://site/bmw/3-serie/g20/320d/1", stage_html(190, 220, 400, 450)),
            ("https://site/bmw/3-serie/g20/320d/2", stage_html(190, 240, 400, 480)),
            ("https://site/bmw/3-serie/g20/320d/3", stage_html(190, 260, 400, 500)),
        ]);
        let policy = StagePolicy { max_stage: Some(2), fill_missing: false };
        let stages =
            discover_stages(&fetcher, ENGINE_URL, &StageSelectors::default(), &policy).await;

        assert_eq!(stages.len(), 2);
        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn fill_missing_copies_last_extracted() {
        // Stage 2 is unreachable; stage 3 exists again
        let fetcher = MapFetcher::new(vec![
            ("https://site/bmw/3-serie/g20/320d/1", stage_html(190, 220, 400, 450)),
            ("https://site/bmw/3-serie/g20/320d/3", stage_html(190, 260, 400, 500)),
        ]);
        let policy = StagePolicy { max_stage: Some(3), fill_missing: true };
        let stages =
            discover_stages(&fetcher, ENGINE_URL, &StageSelectors::default(), &policy).await;

        assert_eq!(stages.len(), 3);
        assert_eq!(stages[1].copied_from, Some(1));
        assert_eq!(stages[1].metrics, stages[0].metrics);
        assert_eq!(stages[2].copied_from, None);
        assert_eq!(stages[2].metrics.hp.unwrap().tuned, 260);
    }

    #[tokio::test]
    async fn fill_missing_needs_something_to_copy() {
        // First probe is already empty, so there is nothing to fill from
        let fetcher = MapFetcher::new(vec![(
            "https://site/bmw/3-serie/g20/320d/1",
            empty_html(),
        )]);
        let policy = StagePolicy { max_stage: Some(5), fill_missing: true };
        let stages =
            discover_stages(&fetcher, ENGINE_URL, &StageSelectors::default(), &policy).await;

        assert!(stages.is_empty());
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_page_counts_as_empty() {
        let fetcher = MapFetcher::new(vec![(
            "https://site/bmw/3-serie/g20/320d/1",
            stage_html(95, 115, 160, 200),
        )]);
        let policy = StagePolicy { max_stage: None, fill_missing: false };
        let stages =
            discover_stages(&fetcher, ENGINE_URL, &StageSelectors::default(), &policy).await;

        assert_eq!(stages.len(), 1);
    }
}
