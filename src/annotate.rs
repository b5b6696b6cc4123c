use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::catalog::{Catalog, Engine, UNKNOWN_CODE};
use crate::period;
use crate::rules::{self, UpgradeInfo, VehicleInfo};

/// Tallies from one re-annotation pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AnnotateCounts {
    pub engines: usize,
    pub stages: usize,
    pub ecu_unlock: usize,
    pub cpc_upgrade: usize,
}

/// Recompute the manufacturer-rule payloads over a saved catalog, in place.
/// Stage annotations are overwritten wholesale; engine records are never
/// revised here. `tick` is called with each batch of engines decided.
pub fn annotate_catalog(catalog: &mut Catalog, mut tick: impl FnMut(u64)) -> AnnotateCounts {
    let bmw = rules::bmw::ecu_unlock();
    let amg = rules::amg::cpc_upgrade();

    let brand_of_model: HashMap<u32, &str> = catalog
        .models
        .iter()
        .filter_map(|m| {
            let brand = catalog.brands.iter().find(|b| b.id == m.brand_id)?;
            Some((m.id, brand.name.as_str()))
        })
        .collect();
    let model_names: HashMap<u32, &str> =
        catalog.models.iter().map(|m| (m.id, m.name.as_str())).collect();

    let mut verdicts: HashMap<u32, (Option<UpgradeInfo>, Option<UpgradeInfo>)> =
        HashMap::with_capacity(catalog.engines.len());
    for chunk in catalog.engines.chunks(500) {
        let decided: Vec<_> = chunk
            .par_iter()
            .map(|engine| {
                let brand_name = brand_of_model.get(&engine.model_id).copied().unwrap_or("");
                let model_name = model_names.get(&engine.model_id).copied();
                let vehicle = vehicle_info(engine, model_name);
                let ecu = bmw.annotate(brand_name, &vehicle);
                let cpc = amg.annotate(brand_name, &vehicle);
                (engine.id, (ecu, cpc))
            })
            .collect();
        verdicts.extend(decided);
        tick(chunk.len() as u64);
    }

    let mut counts = AnnotateCounts {
        engines: catalog.engines.len(),
        ..AnnotateCounts::default()
    };
    for stage in &mut catalog.stages {
        let Some((ecu, cpc)) = verdicts.get(&stage.engine_id) else {
            debug!("Stage {} references unknown engine {}", stage.id, stage.engine_id);
            continue;
        };
        stage.ecu_unlock = ecu.clone();
        stage.cpc_upgrade = cpc.clone();
        counts.stages += 1;
        if ecu.is_some() {
            counts.ecu_unlock += 1;
        }
        if cpc.is_some() {
            counts.cpc_upgrade += 1;
        }
    }

    info!(
        "Annotated {} stages across {} engines ({} ECU unlock, {} CPC upgrade)",
        counts.stages, counts.engines, counts.ecu_unlock, counts.cpc_upgrade
    );
    counts
}

/// The persisted year wins over re-parsing the type text; the two only
/// differ when the record predates the year columns.
fn vehicle_info(engine: &Engine, model_name: Option<&str>) -> VehicleInfo {
    VehicleInfo {
        engine_code: (engine.code != UNKNOWN_CODE).then(|| engine.code.clone()),
        model_name: model_name.map(str::to_string),
        engine_name: Some(engine.name.clone()),
        type_name: Some(engine.type_name.clone()),
        year: engine
            .start_year
            .as_deref()
            .and_then(|y| y.parse().ok())
            .or_else(|| period::production_year(&engine.type_name)),
        platform_code: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Brand, Model, Stage, TypeRecord};

    fn engine(id: u32, model_id: u32, code: &str, type_name: &str, start: Option<&str>) -> Engine {
        Engine {
            id,
            type_id: 1,
            model_id,
            code: code.to_string(),
            name: format!("{code} engine"),
            start_year: start.map(str::to_string),
            end_year: "now".to_string(),
            type_name: type_name.to_string(),
        }
    }

    fn stage(id: u32, engine_id: u32) -> Stage {
        Stage {
            id,
            engine_id,
            stage_name: "Stage 1".to_string(),
            stock_hp: 100,
            stock_nm: 200,
            tuned_hp: 130,
            tuned_nm: 260,
            gain_hp: 30,
            gain_nm: 60,
            old_price: 0,
            new_price: 0,
            currency: "EUR".to_string(),
            hardware_mods: Vec::new(),
            gearbox_limit_nm: 0,
            recommended_gearbox_tune: false,
            notes: String::new(),
            copied_from_stage: None,
            ecu_unlock: None,
            cpc_upgrade: None,
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            brands: vec![
                Brand { id: 1, name: "BMW".to_string() },
                Brand { id: 2, name: "Mercedes".to_string() },
            ],
            models: vec![
                Model { id: 1, brand_id: 1, name: "3-serie".to_string() },
                Model { id: 2, brand_id: 2, name: "C63 S".to_string() },
            ],
            types: vec![TypeRecord {
                id: 1,
                model_id: 1,
                brand_id: 1,
                brand_name: "BMW".to_string(),
                model_name: "3-serie".to_string(),
                name: "G20 - 2021 -> ...".to_string(),
            }],
            engines: vec![
                engine(1, 1, "B47", "G20 - 2021 -> ...", Some("2021")),
                engine(2, 2, "M177", "W205 - 2018 -> ...", Some("2018")),
                engine(3, 1, "B47", "F30 - 2015 -> 2019", Some("2015")),
            ],
            stages: vec![stage(1, 1), stage(2, 2), stage(3, 3), stage(4, 99)],
        }
    }

    #[test]
    fn fills_both_rule_families() {
        let mut cat = catalog();
        let counts = annotate_catalog(&mut cat, |_| {});

        assert_eq!(counts.engines, 3);
        assert_eq!(counts.stages, 3);
        assert_eq!(counts.ecu_unlock, 1);
        assert_eq!(counts.cpc_upgrade, 1);

        assert!(cat.stages[0].ecu_unlock.is_some());
        assert!(cat.stages[0].cpc_upgrade.is_none());
        assert!(cat.stages[1].cpc_upgrade.is_some());
        assert!(cat.stages[1].ecu_unlock.is_none());
        // Pre-cutoff build of the same engine stays clean
        assert!(cat.stages[2].ecu_unlock.is_none());
        // Orphaned stage is left untouched
        assert!(cat.stages[3].ecu_unlock.is_none());
    }

    #[test]
    fn rerun_overwrites_stale_payloads() {
        let mut cat = catalog();
        annotate_catalog(&mut cat, |_| {});
        // Flip the year back before the cutoff and re-run
        cat.engines[0].start_year = Some("2015".to_string());
        cat.engines[0].type_name = "F30 - 2015 -> 2019".to_string();
        annotate_catalog(&mut cat, |_| {});
        assert!(cat.stages[0].ecu_unlock.is_none());
    }

    #[test]
    fn engines_never_revised() {
        let mut cat = catalog();
        cat.engines[0].code = "UNKNOWN".to_string();
        annotate_catalog(&mut cat, |_| {});
        assert_eq!(cat.engines[0].code, "UNKNOWN");
        assert_eq!(cat.engines[0].start_year.as_deref(), Some("2021"));
    }
}
