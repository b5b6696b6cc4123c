use chrono::NaiveDate;
use regex::Regex;

use super::{AffectedEngine, RuleSet};

static AMG_V8_ENGINES: &[AffectedEngine] = &[
    AffectedEngine { code: "M177", controller: "CPC", description: "4.0L V8 Biturbo" },
    AffectedEngine { code: "M178", controller: "CPC", description: "4.0L V8 Biturbo (AMG GT)" },
];

static MODEL_ENGINE_MAP: &[(&str, &str)] = &[
    ("C63", "M177"),
    ("C63 S", "M177"),
    ("E63", "M177"),
    ("E63 S", "M177"),
    ("S63", "M177"),
    ("GT 4-door", "M177"),
    ("GT 53", "M177"),
    ("GT 63", "M177"),
    ("GT 63 S", "M177"),
    ("GLE63", "M177"),
    ("GLE63 S", "M177"),
    ("GLS63", "M177"),
    ("G63", "M177"),
    ("CLS53", "M177"),
    ("CLS63", "M177"),
    ("AMG GT", "M178"),
    ("AMG GT S", "M178"),
    ("AMG GT C", "M178"),
    ("AMG GT R", "M178"),
    ("AMG GT Black Series", "M178"),
];

const CPC_NOTE: &str = "Alle Mercedes-AMG modellen met M177/M178 V8 motoren (2018 en later) hebben een CPC-upgrade nodig voor optimale prestaties en betrouwbaarheid. Neem contact op voor meer informatie.";

/// Rule family for the CPC upgrade that M177/M178 V8 cars need from 2018 on.
pub fn cpc_upgrade() -> RuleSet {
    RuleSet {
        name: "Mercedes-AMG CPC upgrade",
        brand_key: "mercedes",
        code_pattern: Regex::new(r"(?i)M17[78]").unwrap(),
        affected: AMG_V8_ENGINES,
        model_codes: MODEL_ENGINE_MAP,
        platforms: &[],
        platform_pattern: None,
        cutoff_year: 2018,
        from_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
        target_model: Some(Regex::new(r"(?i)AMG|63|53|GT").unwrap()),
        note: CPC_NOTE,
    }
}
