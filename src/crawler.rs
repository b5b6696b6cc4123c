use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::catalog::{Brand, Catalog, Engine, IdCounters, Model, Stage, TypeRecord, UNKNOWN_CODE};
use crate::config::CrawlConfig;
use crate::extract::{self, EngineLink, LinkItem};
use crate::fetch::PageFetcher;
use crate::paginate::{self, DiscoveredStage, StagePolicy};
use crate::period;
use crate::rules::{self, RuleSet, UpgradeInfo, VehicleInfo};
use crate::store::CatalogStore;

/// Counters reported after a crawl.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub brands: usize,
    pub models: usize,
    pub types: usize,
    pub engines: usize,
    pub stages: usize,
    pub failed_branches: usize,
}

pub struct Crawler<'a, F: PageFetcher> {
    config: &'a CrawlConfig,
    fetcher: &'a F,
    store: &'a CatalogStore,
    ids: IdCounters,
    catalog: Catalog,
    stats: CrawlStats,
    bmw: RuleSet,
    amg: RuleSet,
}

impl<'a, F: PageFetcher> Crawler<'a, F> {
    pub fn new(config: &'a CrawlConfig, fetcher: &'a F, store: &'a CatalogStore) -> Self {
        Self {
            config,
            fetcher,
            store,
            ids: IdCounters::new(),
            catalog: Catalog::default(),
            stats: CrawlStats::default(),
            bmw: rules::bmw::ecu_unlock(),
            amg: rules::amg::cpc_upgrade(),
        }
    }

    /// Walk brand → model → type → engine → stages depth-first, committing a
    /// checkpoint after every type. Only a failed or empty brand listing
    /// aborts the run; a failure deeper down costs that branch its children
    /// and nothing else.
    pub async fn crawl(mut self) -> Result<(Catalog, CrawlStats)> {
        let config = self.config;
        let brands = self.scrape_brands().await?;
        info!("Crawling {} brands", brands.len());

        for brand_link in brands {
            let brand = Brand { id: self.ids.next_brand(), name: brand_link.name.clone() };
            info!("Brand {}: {}", brand.id, brand.name);
            self.catalog.brands.push(brand.clone());
            self.stats.brands += 1;

            let models = self
                .child_links(&brand_link.url, &config.selectors.models, "models")
                .await;
            for model_link in models {
                let model = Model {
                    id: self.ids.next_model(),
                    brand_id: brand.id,
                    name: model_link.name.clone(),
                };
                debug!("  Model {}: {}", model.id, model.name);
                self.catalog.models.push(model.clone());
                self.stats.models += 1;

                let types = self
                    .child_links(&model_link.url, &config.selectors.types, "types")
                    .await;
                for type_link in types {
                    let ty = TypeRecord {
                        id: self.ids.next_type(),
                        model_id: model.id,
                        brand_id: brand.id,
                        brand_name: brand.name.clone(),
                        model_name: model.name.clone(),
                        name: type_link.name.clone(),
                    };
                    debug!("    Type {}: {}", ty.id, ty.name);
                    self.catalog.types.push(ty.clone());
                    self.stats.types += 1;

                    let engines = self.engine_links(&type_link.url).await;
                    for link in engines {
                        self.process_engine(&brand, &model, &ty, link).await;
                    }

                    self.store
                        .save(&self.catalog)
                        .with_context(|| format!("checkpoint after type {}", ty.name))?;
                }
            }
        }

        self.store.save(&self.catalog).context("final save")?;
        info!(
            "Crawl finished: {} brands, {} models, {} types, {} engines, {} stages ({} failed branches)",
            self.stats.brands,
            self.stats.models,
            self.stats.types,
            self.stats.engines,
            self.stats.stages,
            self.stats.failed_branches
        );
        Ok((self.catalog, self.stats))
    }

    /// The one fatal step: no brand listing, or no brand matching the
    /// allow-list, means there is nothing to crawl.
    async fn scrape_brands(&self) -> Result<Vec<LinkItem>> {
        let config = self.config;
        let html = self
            .fetcher
            .fetch(&config.base_url)
            .await
            .with_context(|| format!("loading brand listing {}", config.base_url))?;
        let links = extract::parse_links(&html, &config.selectors.brands, &config.base_url)
            .context("reading brand links")?;
        let matched: Vec<LinkItem> =
            links.into_iter().filter(|l| self.is_target_brand(&l.name)).collect();
        if matched.is_empty() {
            bail!("no target brands found at {}", config.base_url);
        }
        Ok(matched)
    }

    fn is_target_brand(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.config.target_brands.iter().any(|t| lower.contains(&t.to_lowercase()))
    }

    async fn child_links(&mut self, url: &str, selector: &str, what: &str) -> Vec<LinkItem> {
        let html = match self.fetcher.fetch(url).await {
            Ok(h) => h,
            Err(e) => {
                warn!("Skipping {} under {}: {}", what, url, e);
                self.stats.failed_branches += 1;
                return Vec::new();
            }
        };
        match extract::parse_links(&html, selector, url) {
            Ok(links) => {
                if links.is_empty() {
                    warn!("No {} found at {}", what, url);
                }
                links
            }
            Err(e) => {
                warn!("Skipping {} under {}: {}", what, url, e);
                self.stats.failed_branches += 1;
                Vec::new()
            }
        }
    }

    async fn engine_links(&mut self, url: &str) -> Vec<EngineLink> {
        let config = self.config;
        let html = match self.fetcher.fetch(url).await {
            Ok(h) => h,
            Err(e) => {
                warn!("Skipping engines under {}: {}", url, e);
                self.stats.failed_branches += 1;
                return Vec::new();
            }
        };
        match extract::parse_engine_links(
            &html,
            &config.selectors.engines,
            &config.selectors.engine_spans,
            url,
        ) {
            Ok(links) => {
                if links.is_empty() {
                    warn!("No engines found at {}", url);
                }
                links
            }
            Err(e) => {
                warn!("Skipping engines under {}: {}", url, e);
                self.stats.failed_branches += 1;
                Vec::new()
            }
        }
    }

    async fn process_engine(
        &mut self,
        brand: &Brand,
        model: &Model,
        ty: &TypeRecord,
        link: EngineLink,
    ) {
        let config = self.config;
        let trim = period::normalize_name(&link.name);
        let power = period::normalize_name(&link.power);
        let code = self.infer_engine_code(&trim, &model.name);
        let range = period::parse_year_range(&ty.name);
        let name = period::normalize_name(&format!("{trim} {power}"));

        let engine = Engine {
            id: self.ids.next_engine(),
            type_id: ty.id,
            model_id: model.id,
            code: code.clone(),
            name: name.clone(),
            start_year: range.start,
            end_year: range.end,
            type_name: ty.name.clone(),
        };
        debug!("      Engine {}: {} [{}]", engine.id, engine.name, engine.code);
        let engine_id = engine.id;
        self.catalog.engines.push(engine);
        self.stats.engines += 1;

        let policy = StagePolicy {
            max_stage: config.max_stage,
            fill_missing: config.fill_missing_stages,
        };
        let discovered =
            paginate::discover_stages(self.fetcher, &link.url, &config.selectors.stage, &policy)
                .await;
        if discovered.is_empty() {
            warn!("No stages extracted for {}", name);
        }

        let vehicle = VehicleInfo {
            engine_code: (code != UNKNOWN_CODE).then(|| code.clone()),
            model_name: Some(model.name.clone()),
            engine_name: Some(name.clone()),
            type_name: Some(ty.name.clone()),
            year: period::production_year(&ty.name),
            platform_code: None,
        };
        let ecu_unlock = self.bmw.annotate(&brand.name, &vehicle);
        let cpc_upgrade = self.amg.annotate(&brand.name, &vehicle);

        for ds in &discovered {
            for suffix in ["", "+"] {
                let stage = build_stage(
                    self.ids.next_stage(),
                    engine_id,
                    ds,
                    suffix,
                    ecu_unlock.clone(),
                    cpc_upgrade.clone(),
                );
                self.catalog.stages.push(stage);
                self.stats.stages += 1;
            }
        }
    }

    /// Code embedded in the trim text wins; the static model tables are the
    /// fallback; UNKNOWN closes the chain.
    fn infer_engine_code(&self, trim: &str, model_name: &str) -> String {
        self.bmw
            .infer_engine_code(trim)
            .or_else(|| self.amg.infer_engine_code(trim))
            .or_else(|| self.bmw.infer_from_model_name(Some(model_name), Some(trim)))
            .or_else(|| self.amg.infer_from_model_name(Some(model_name), Some(trim)))
            .unwrap_or_else(|| UNKNOWN_CODE.to_string())
    }
}

/// Every extracted or copied stage lands twice: once plain, once as the
/// "+"-variant, with identical metrics.
fn build_stage(
    id: u32,
    engine_id: u32,
    ds: &DiscoveredStage,
    suffix: &str,
    ecu_unlock: Option<UpgradeInfo>,
    cpc_upgrade: Option<UpgradeInfo>,
) -> Stage {
    let hp = ds.metrics.hp.unwrap_or_default();
    let nm = ds.metrics.nm.unwrap_or_default();
    let price = ds.metrics.price.unwrap_or_default();

    Stage {
        id,
        engine_id,
        stage_name: format!("Stage {}{}", ds.number, suffix),
        stock_hp: hp.stock,
        stock_nm: nm.stock,
        tuned_hp: hp.tuned,
        tuned_nm: nm.tuned,
        gain_hp: hp.tuned - hp.stock,
        gain_nm: nm.tuned - nm.stock,
        old_price: price.old.unwrap_or(0),
        new_price: price.new.unwrap_or(0),
        currency: "EUR".to_string(),
        hardware_mods: Vec::new(),
        gearbox_limit_nm: 0,
        recommended_gearbox_tune: false,
        notes: String::new(),
        copied_from_stage: ds.copied_from,
        ecu_unlock,
        cpc_upgrade,
    }
}
