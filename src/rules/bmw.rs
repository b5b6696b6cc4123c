use chrono::NaiveDate;
use regex::Regex;

use super::{AffectedEngine, RuleSet};

// Engines delivered with MG1 (petrol) or MD1 (diesel) control units
static MG1_MD1_ENGINES: &[AffectedEngine] = &[
    AffectedEngine { code: "B38", controller: "MG1", description: "1.5L 3-cylinder turbo" },
    AffectedEngine { code: "B46", controller: "MG1", description: "2.0L 4-cylinder turbo" },
    AffectedEngine { code: "B48", controller: "MG1", description: "2.0L 4-cylinder turbo" },
    AffectedEngine { code: "B58", controller: "MG1", description: "3.0L 6-cylinder turbo" },
    AffectedEngine { code: "B58TU", controller: "MG1", description: "3.0L 6-cylinder turbo (TU)" },
    AffectedEngine { code: "S58", controller: "MG1", description: "3.0L 6-cylinder twin-turbo (M)" },
    AffectedEngine { code: "S63", controller: "MG1", description: "4.4L V8 twin-turbo (M)" },
    AffectedEngine { code: "N63", controller: "MG1", description: "4.4L V8 twin-turbo" },
    AffectedEngine { code: "B37", controller: "MD1", description: "1.5L 3-cylinder diesel" },
    AffectedEngine { code: "B47", controller: "MD1", description: "2.0L 4-cylinder diesel" },
    AffectedEngine { code: "B57", controller: "MD1", description: "3.0L 6-cylinder diesel" },
];

static MODEL_ENGINE_MAP: &[(&str, &str)] = &[
    // 1-Series
    ("118i", "B38"),
    ("120i", "B48"),
    ("118d", "B47"),
    ("120d", "B47"),
    // 2-Series
    ("218i", "B38"),
    ("220i", "B48"),
    ("218d", "B47"),
    ("220d", "B47"),
    ("M235i", "B58"),
    ("M240i", "B58"),
    // 3-Series
    ("318i", "B48"),
    ("320i", "B48"),
    ("330i", "B48"),
    ("M340i", "B58"),
    ("318d", "B47"),
    ("320d", "B47"),
    ("330d", "B57"),
    // 4-Series
    ("420i", "B48"),
    ("430i", "B48"),
    ("440i", "B58"),
    ("M440i", "B58"),
    ("420d", "B47"),
    ("430d", "B57"),
    // 5-Series
    ("520i", "B48"),
    ("530i", "B48"),
    ("540i", "B58"),
    ("M550i", "N63"),
    ("520d", "B47"),
    ("530d", "B57"),
    ("540d", "B57"),
    // X-Series
    ("X1 18i", "B38"),
    ("X1 20i", "B48"),
    ("X1 18d", "B47"),
    ("X1 20d", "B47"),
    ("X3 20i", "B48"),
    ("X3 30i", "B48"),
    ("X3 M40i", "B58"),
    ("X3 20d", "B47"),
    ("X3 30d", "B57"),
    ("X5 40i", "B58"),
    ("X5 50i", "N63"),
    ("X5 30d", "B57"),
    ("X5 40d", "B57"),
    // M-Series
    ("M2", "S58"),
    ("M3", "S58"),
    ("M4", "S58"),
    ("M5", "S63"),
    ("M8", "S63"),
    ("X3 M", "S58"),
    ("X4 M", "S58"),
    ("X5 M", "S63"),
    ("X6 M", "S63"),
];

// G-series and late F-series chassis, all shipped with MG1/MD1
static MG1_PLATFORMS: &[&str] = &[
    "F40", "F44", // 1-Series
    "F45", "F46", // 2-Series Active/Gran Tourer
    "G42", // 2-Series Coupe
    "G20", "G21", // 3-Series
    "G22", "G23", "G26", // 4-Series
    "G30", "G31", // 5-Series
    "G32", // 6-Series GT
    "G11", "G12", // 7-Series
    "G14", "G15", "G16", // 8-Series
    "F48", "F49", // X1
    "U06", // X1 (new)
    "F39", // X2
    "G01", // X3
    "G02", // X4
    "G05", // X5
    "G06", // X6
    "G07", // X7
];

const UNLOCK_NOTE: &str = "Alle BMW's met productiedatum ná 06/2020 hebben anti-tuning protection (MG1/MD1). ECU unlock vereist voor chiptuning. Neem contact op voor meer informatie.";

/// Rule family for the MG1/MD1 anti-tuning lock BMW ships since June 2020.
pub fn ecu_unlock() -> RuleSet {
    RuleSet {
        name: "BMW MG1/MD1 ECU unlock",
        brand_key: "bmw",
        code_pattern: Regex::new(r"(?i)\b([BS]\d{2,3}[A-Z]*\d*)\b").unwrap(),
        affected: MG1_MD1_ENGINES,
        model_codes: MODEL_ENGINE_MAP,
        platforms: MG1_PLATFORMS,
        platform_pattern: Some(Regex::new(r"(?i)([FG]\d{2})").unwrap()),
        cutoff_year: 2020,
        from_date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
        target_model: None,
        note: UNLOCK_NOTE,
    }
}
