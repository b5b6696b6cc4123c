use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::config::StageSelectors;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{selector}`")]
    Selector { selector: String },
}

fn parse_selector(raw: &str) -> Result<Selector, ExtractError> {
    Selector::parse(raw).map_err(|_| ExtractError::Selector { selector: raw.to_string() })
}

// ── Link lists ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkItem {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLink {
    pub name: String,
    pub power: String,
    pub url: String,
}

/// Anchor text + resolved href for every element the selector matches.
/// Anchors without text or href are skipped.
pub fn parse_links(html: &str, selector: &str, page_url: &str) -> Result<Vec<LinkItem>, ExtractError> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_document(html);
    let mut items = Vec::new();
    for el in doc.select(&sel) {
        let name = element_text(&el);
        let href = match el.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if name.is_empty() || href.is_empty() {
            continue;
        }
        items.push(LinkItem { name, url: resolve_url(page_url, href) });
    }
    Ok(items)
}

/// Engine anchors carry two spans: trim name, then factory power.
pub fn parse_engine_links(
    html: &str,
    selector: &str,
    span_selector: &str,
    page_url: &str,
) -> Result<Vec<EngineLink>, ExtractError> {
    let link_sel = parse_selector(selector)?;
    let span_sel = parse_selector(span_selector)?;
    let doc = Html::parse_document(html);
    let mut items = Vec::new();
    for el in doc.select(&link_sel) {
        let href = match el.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        let mut spans = el.select(&span_sel);
        let name = spans.next().map(|s| element_text(&s)).unwrap_or_default();
        let power = spans.next().map(|s| element_text(&s)).unwrap_or_default();
        if name.is_empty() || href.is_empty() {
            continue;
        }
        items.push(EngineLink { name, power, url: resolve_url(page_url, href) });
    }
    Ok(items)
}

// ── Stage metrics ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricPair {
    pub stock: i64,
    pub tuned: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PricePair {
    pub old: Option<i64>,
    pub new: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageMetrics {
    pub engine_label: Option<String>,
    pub hp: Option<MetricPair>,
    pub nm: Option<MetricPair>,
    pub price: Option<PricePair>,
}

impl StageMetrics {
    /// A stage page counts as empty when neither power, torque nor price
    /// parsed. Partial data is still a stage.
    pub fn is_empty(&self) -> bool {
        self.hp.is_none() && self.nm.is_none() && self.price.is_none()
    }
}

/// Read one stage page: the progress-bar spans hold stock/tuned hp followed
/// by stock/tuned nm, in document order.
pub fn parse_stage_page(html: &str, sel: &StageSelectors) -> Result<StageMetrics, ExtractError> {
    let bars_sel = parse_selector(&sel.progress_values)?;
    let old_sel = parse_selector(&sel.old_price)?;
    let new_sel = parse_selector(&sel.new_price)?;
    let label_sel = parse_selector(&sel.engine_label)?;

    let doc = Html::parse_document(html);
    let bars: Vec<String> = doc.select(&bars_sel).map(|el| element_text(&el)).collect();

    let hp = if bars.len() >= 2 { metric_pair(&bars[0], &bars[1]) } else { None };
    let nm = if bars.len() >= 4 { metric_pair(&bars[2], &bars[3]) } else { None };

    let old = doc.select(&old_sel).next().and_then(|el| parse_metric(&element_text(&el)));
    let new = doc.select(&new_sel).next().and_then(|el| parse_metric(&element_text(&el)));
    let price = (old.is_some() || new.is_some()).then_some(PricePair { old, new });

    let engine_label = doc
        .select(&label_sel)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty());

    Ok(StageMetrics { engine_label, hp, nm, price })
}

/// Strip everything but digits and integer-parse what is left.
pub fn parse_metric(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn metric_pair(stock: &str, tuned: &str) -> Option<MetricPair> {
    let stock = parse_metric(stock)?;
    let tuned = parse_metric(tuned)?;
    Some(MetricPair { stock, tuned })
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_url(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => href.to_string(),
    }
}
