pub mod amg;
pub mod bmw;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::period;

/// Vehicle metadata handed to a rule family. Catalog data is heterogeneous,
/// so every field is optional and the rules work with whatever is present.
#[derive(Debug, Clone, Default)]
pub struct VehicleInfo {
    pub engine_code: Option<String>,
    pub model_name: Option<String>,
    pub engine_name: Option<String>,
    pub type_name: Option<String>,
    pub year: Option<i32>,
    pub platform_code: Option<String>,
}

/// Advisory payload attached to a stage when an upgrade procedure is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeInfo {
    pub required: bool,
    pub from_date: NaiveDate,
    pub note: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AffectedEngine {
    pub code: &'static str,
    pub controller: &'static str,
    pub description: &'static str,
}

/// One manufacturer rule family: which engine codes need an extra procedure,
/// from which production year, and how to recognize those engines in scraped
/// metadata when the code is missing.
pub struct RuleSet {
    pub name: &'static str,
    /// Lowercase fragment of the manufacturer name this family applies to.
    brand_key: &'static str,
    code_pattern: Regex,
    affected: &'static [AffectedEngine],
    model_codes: &'static [(&'static str, &'static str)],
    platforms: &'static [&'static str],
    platform_pattern: Option<Regex>,
    cutoff_year: i32,
    from_date: NaiveDate,
    target_model: Option<Regex>,
    note: &'static str,
}

impl RuleSet {
    /// First engine code found in free text, uppercased.
    pub fn infer_engine_code(&self, text: &str) -> Option<String> {
        self.code_pattern
            .captures(text)
            .and_then(|c| c.get(1).or_else(|| c.get(0)))
            .map(|m| m.as_str().to_uppercase())
    }

    /// Static model-table lookup: the trim name alone, then "model trim".
    pub fn infer_from_model_name(&self, model_name: Option<&str>, trim: Option<&str>) -> Option<String> {
        if let Some(trim) = trim {
            if let Some(code) = self.lookup_model(trim) {
                return Some(code);
            }
        }
        if let (Some(model), Some(trim)) = (model_name, trim) {
            if let Some(code) = self.lookup_model(&format!("{model} {trim}")) {
                return Some(code);
            }
        }
        None
    }

    pub fn is_target_model(&self, model_name: &str) -> bool {
        self.target_model
            .as_ref()
            .map_or(true, |re| re.is_match(model_name))
    }

    /// Whether the extra procedure is required for this vehicle. An affected
    /// code with no recoverable production year counts as required.
    pub fn requires_upgrade(&self, vehicle: &VehicleInfo) -> bool {
        // Guard only applies when a model name is there to test it against
        if let (Some(re), Some(model)) = (self.target_model.as_ref(), vehicle.model_name.as_deref()) {
            if !re.is_match(model) {
                return false;
            }
        }

        if let Some(code) = self.resolve_code(vehicle) {
            if self.is_affected(&code) {
                let year = vehicle.year.or_else(|| {
                    vehicle.type_name.as_deref().and_then(period::production_year)
                });
                return match year {
                    Some(y) => y >= self.cutoff_year,
                    None => true,
                };
            }
        }

        self.platform_applies(vehicle)
    }

    pub fn generate_upgrade_info(&self, required: bool) -> Option<UpgradeInfo> {
        required.then(|| UpgradeInfo {
            required: true,
            from_date: self.from_date,
            note: self.note.to_string(),
        })
    }

    /// Brand-gated decision: `None` for any other manufacturer, otherwise
    /// the payload when the upgrade is required.
    pub fn annotate(&self, brand_name: &str, vehicle: &VehicleInfo) -> Option<UpgradeInfo> {
        if !brand_name.to_lowercase().contains(self.brand_key) {
            return None;
        }
        self.generate_upgrade_info(self.requires_upgrade(vehicle))
    }

    pub fn affected_profile(&self, code: &str) -> Option<&'static AffectedEngine> {
        self.affected.iter().find(|e| e.code == code)
    }

    fn resolve_code(&self, vehicle: &VehicleInfo) -> Option<String> {
        if let Some(code) = vehicle.engine_code.as_deref() {
            let code = normalize_code(code);
            if !code.is_empty() {
                return Some(code);
            }
        }
        if let Some(name) = vehicle.engine_name.as_deref() {
            if let Some(code) = self.infer_engine_code(name) {
                return Some(code);
            }
        }
        self.infer_from_model_name(vehicle.model_name.as_deref(), vehicle.engine_name.as_deref())
    }

    fn is_affected(&self, code: &str) -> bool {
        self.affected.iter().any(|e| e.code == code)
    }

    fn platform_applies(&self, vehicle: &VehicleInfo) -> bool {
        if self.platforms.is_empty() {
            return false;
        }
        if let Some(code) = vehicle.platform_code.as_deref() {
            if self.platform_known(code) {
                return true;
            }
        }
        if let (Some(re), Some(ty)) = (self.platform_pattern.as_ref(), vehicle.type_name.as_deref()) {
            if let Some(caps) = re.captures(ty) {
                return self.platform_known(&caps[1]);
            }
        }
        false
    }

    fn platform_known(&self, code: &str) -> bool {
        let upper = code.to_uppercase();
        self.platforms.iter().any(|p| upper.contains(p))
    }

    fn lookup_model(&self, key: &str) -> Option<String> {
        self.model_codes
            .iter()
            .find(|(model, _)| *model == key)
            .map(|(_, code)| code.to_string())
    }
}

/// "m 177" and "M177" name the same engine.
fn normalize_code(code: &str) -> String {
    code.split_whitespace().collect::<String>().to_uppercase()
}
