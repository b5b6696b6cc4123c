use serde::{Deserialize, Serialize};

use crate::rules::UpgradeInfo;

/// Engine code sentinel when neither extraction nor inference produced one.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

// ── Records ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: u32,
    pub brand_id: u32,
    pub name: String,
}

/// A body/platform generation under a model. Brand and model names are
/// denormalized so rule evaluation needs no re-join.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRecord {
    pub id: u32,
    pub model_id: u32,
    pub brand_id: u32,
    pub brand_name: String,
    pub model_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engine {
    pub id: u32,
    pub type_id: u32,
    pub model_id: u32,
    pub code: String,
    pub name: String,
    pub start_year: Option<String>,
    pub end_year: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: u32,
    pub engine_id: u32,
    pub stage_name: String,
    pub stock_hp: i64,
    pub stock_nm: i64,
    pub tuned_hp: i64,
    pub tuned_nm: i64,
    pub gain_hp: i64,
    pub gain_nm: i64,
    pub old_price: i64,
    pub new_price: i64,
    pub currency: String,
    pub hardware_mods: Vec<String>,
    pub gearbox_limit_nm: i64,
    pub recommended_gearbox_tune: bool,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from_stage: Option<u32>,
    #[serde(default)]
    pub ecu_unlock: Option<UpgradeInfo>,
    #[serde(default)]
    pub cpc_upgrade: Option<UpgradeInfo>,
}

// ── Catalog document ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub brands: Vec<Brand>,
    pub models: Vec<Model>,
    pub types: Vec<TypeRecord>,
    pub engines: Vec<Engine>,
    pub stages: Vec<Stage>,
}

/// Engine plus the names joined in from its parent records.
pub struct EngineContext<'a> {
    pub engine: &'a Engine,
    pub brand_name: &'a str,
    pub model_name: &'a str,
}

/// Record counts and data-quality tallies over one document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub brands: usize,
    pub models: usize,
    pub types: usize,
    pub engines: usize,
    pub stages: usize,
    pub unknown_codes: usize,
    pub copied_stages: usize,
    pub stages_without_metrics: usize,
    pub ecu_unlock_flags: usize,
    pub cpc_upgrade_flags: usize,
}

impl Catalog {
    pub fn engine_context(&self, engine_id: u32) -> Option<EngineContext<'_>> {
        let engine = self.engines.iter().find(|e| e.id == engine_id)?;
        let model = self.models.iter().find(|m| m.id == engine.model_id)?;
        let brand = self.brands.iter().find(|b| b.id == model.brand_id)?;
        Some(EngineContext {
            engine,
            brand_name: &brand.name,
            model_name: &model.name,
        })
    }

    pub fn stage_count(&self, engine_id: u32) -> usize {
        self.stages.iter().filter(|s| s.engine_id == engine_id).count()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            brands: self.brands.len(),
            models: self.models.len(),
            types: self.types.len(),
            engines: self.engines.len(),
            stages: self.stages.len(),
            unknown_codes: self.engines.iter().filter(|e| e.code == UNKNOWN_CODE).count(),
            copied_stages: self
                .stages
                .iter()
                .filter(|s| s.copied_from_stage.is_some())
                .count(),
            stages_without_metrics: self
                .stages
                .iter()
                .filter(|s| s.tuned_hp == 0 && s.tuned_nm == 0)
                .count(),
            ecu_unlock_flags: self.stages.iter().filter(|s| s.ecu_unlock.is_some()).count(),
            cpc_upgrade_flags: self.stages.iter().filter(|s| s.cpc_upgrade.is_some()).count(),
        }
    }
}

// ── Id assignment ──

/// Crawl-scoped id sequences, one per record table. Ids start at 1 and are
/// never reused or reset within a run.
#[derive(Debug, Clone)]
pub struct IdCounters {
    brand: u32,
    model: u32,
    vehicle_type: u32,
    engine: u32,
    stage: u32,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self { brand: 1, model: 1, vehicle_type: 1, engine: 1, stage: 1 }
    }
}

impl IdCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_brand(&mut self) -> u32 {
        let id = self.brand;
        self.brand += 1;
        id
    }

    pub fn next_model(&mut self) -> u32 {
        let id = self.model;
        self.model += 1;
        id
    }

    pub fn next_type(&mut self) -> u32 {
        let id = self.vehicle_type;
        self.vehicle_type += 1;
        id
    }

    pub fn next_engine(&mut self) -> u32 {
        let id = self.engine;
        self.engine += 1;
        id
    }

    pub fn next_stage(&mut self) -> u32 {
        let id = self.stage;
        self.stage += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_catalog() -> Catalog {
        Catalog {
            brands: vec![Brand { id: 1, name: "BMW".into() }],
            models: vec![Model { id: 1, brand_id: 1, name: "3-serie".into() }],
            types: vec![TypeRecord {
                id: 1,
                model_id: 1,
                brand_id: 1,
                brand_name: "BMW".into(),
                model_name: "3-serie".into(),
                name: "G20 - 2019 -> ...".into(),
            }],
            engines: vec![Engine {
                id: 1,
                type_id: 1,
                model_id: 1,
                code: "B58".into(),
                name: "M340i 374 PK".into(),
                start_year: Some("2019".into()),
                end_year: "now".into(),
                type_name: "G20 - 2019 -> ...".into(),
            }],
            stages: vec![Stage {
                id: 1,
                engine_id: 1,
                stage_name: "Stage 1".into(),
                stock_hp: 374,
                stock_nm: 500,
                tuned_hp: 420,
                tuned_nm: 570,
                gain_hp: 46,
                gain_nm: 70,
                old_price: 899,
                new_price: 749,
                currency: "EUR".into(),
                hardware_mods: vec![],
                gearbox_limit_nm: 0,
                recommended_gearbox_tune: false,
                notes: String::new(),
                copied_from_stage: None,
                ecu_unlock: None,
                cpc_upgrade: None,
            }],
        }
    }

    #[test]
    fn monotonic_ids() {
        let mut ids = IdCounters::new();
        assert_eq!(ids.next_brand(), 1);
        assert_eq!(ids.next_brand(), 2);
        // Sequences are independent per table
        assert_eq!(ids.next_engine(), 1);
        assert_eq!(ids.next_stage(), 1);
        assert_eq!(ids.next_stage(), 2);
        assert_eq!(ids.next_brand(), 3);
    }

    #[test]
    fn serialized_field_names() {
        let json = serde_json::to_value(small_catalog()).unwrap();
        let stage = &json["stages"][0];
        assert!(stage.get("stageName").is_some());
        assert!(stage.get("gainHp").is_some());
        assert!(stage.get("copiedFromStage").is_none(), "absent unless copied");
        assert!(stage["ecuUnlock"].is_null());
        let engine = &json["engines"][0];
        assert!(engine.get("type").is_some());
        assert!(engine.get("startYear").is_some());
    }

    #[test]
    fn copied_stage_keeps_tag() {
        let mut catalog = small_catalog();
        catalog.stages[0].copied_from_stage = Some(1);
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["stages"][0]["copiedFromStage"], 1);
    }

    #[test]
    fn stats_count_quality_markers() {
        let mut catalog = small_catalog();
        catalog.engines[0].code = UNKNOWN_CODE.into();
        catalog.stages[0].copied_from_stage = Some(1);
        catalog.stages.push(Stage {
            id: 2,
            tuned_hp: 0,
            tuned_nm: 0,
            copied_from_stage: None,
            ..catalog.stages[0].clone()
        });
        let s = catalog.stats();
        assert_eq!(s.engines, 1);
        assert_eq!(s.stages, 2);
        assert_eq!(s.unknown_codes, 1);
        assert_eq!(s.copied_stages, 1);
        assert_eq!(s.stages_without_metrics, 1);
        assert_eq!(s.ecu_unlock_flags, 0);
    }

    #[test]
    fn engine_context_joins_names() {
        let catalog = small_catalog();
        let ctx = catalog.engine_context(1).unwrap();
        assert_eq!(ctx.brand_name, "BMW");
        assert_eq!(ctx.model_name, "3-serie");
        assert_eq!(ctx.engine.code, "B58");
        assert!(catalog.engine_context(99).is_none());
    }

    #[test]
    fn loads_document_without_annotations() {
        let doc = r#"{
            "brands": [{"id": 1, "name": "BMW"}],
            "models": [],
            "types": [],
            "engines": [],
            "stages": [{
                "id": 1, "engineId": 1, "stageName": "Stage 1",
                "stockHp": 100, "stockNm": 200, "tunedHp": 130, "tunedNm": 250,
                "gainHp": 30, "gainNm": 50, "oldPrice": 0, "newPrice": 0,
                "currency": "EUR", "hardwareMods": [], "gearboxLimitNm": 0,
                "recommendedGearboxTune": false, "notes": ""
            }]
        }"#;
        let catalog: Catalog = serde_json::from_str(doc).unwrap();
        assert!(catalog.stages[0].ecu_unlock.is_none());
        assert!(catalog.stages[0].copied_from_stage.is_none());
    }
}
