//! Country cost profiles: country code → cost group and multipliers.
//!
//! Erasmus+ unit costs differ by country. The engine condenses this into four
//! [`CostGroup`]s and two multipliers per country, relative to a Western
//! European baseline of `1.0`:
//!
//! - **A** Northern Europe (highest costs)
//! - **B** Western Europe (baseline)
//! - **C** Southern / Central Europe
//! - **D** Balkans, Eastern Europe and neighbourhood countries
//!
//! The staff multiplier scales personnel lines, the travel multiplier scales
//! travel and subsistence. Other categories are priced the same everywhere.
//!
//! Codes missing from the table resolve to group B with both multipliers at
//! `1.0`. Unknown countries are priced at the baseline instead of guessed.

use serde::{Deserialize, Serialize};

/// Country cost group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostGroup {
    A,
    B,
    C,
    D,
}

impl CostGroup {
    pub fn label(self) -> &'static str {
        match self {
            CostGroup::A => "Northern Europe",
            CostGroup::B => "Western Europe",
            CostGroup::C => "Southern/Central Europe",
            CostGroup::D => "Balkans/Eastern Europe",
        }
    }

    pub fn label_de(self) -> &'static str {
        match self {
            CostGroup::A => "Nordeuropa",
            CostGroup::B => "Westeuropa",
            CostGroup::C => "Süd-/Mitteleuropa",
            CostGroup::D => "Balkan/Osteuropa",
        }
    }
}

/// Resolved cost profile for one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryProfile {
    /// Upper-case ISO-3166 alpha-2 code.
    pub code: String,
    pub name: String,
    pub name_de: String,
    pub group: CostGroup,
    /// Staff cost multiplier relative to the baseline.
    pub staff_multiplier: f64,
    /// Travel / subsistence multiplier relative to the baseline.
    pub travel_multiplier: f64,
}

struct Entry {
    code: &'static str,
    name: &'static str,
    name_de: &'static str,
    group: CostGroup,
    staff: f64,
    travel: f64,
}

const fn entry(
    code: &'static str,
    name: &'static str,
    name_de: &'static str,
    group: CostGroup,
    staff: f64,
    travel: f64,
) -> Entry {
    Entry {
        code,
        name,
        name_de,
        group,
        staff,
        travel,
    }
}

use CostGroup::{A, B, C, D};

static COUNTRY_TABLE: &[Entry] = &[
    // ── Group A ──────────────────────────────────────────────────────
    entry("DK", "Denmark", "Dänemark", A, 1.20, 1.15),
    entry("SE", "Sweden", "Schweden", A, 1.15, 1.15),
    entry("FI", "Finland", "Finnland", A, 1.10, 1.10),
    entry("NO", "Norway", "Norwegen", A, 1.25, 1.20),
    entry("IS", "Iceland", "Island", A, 1.20, 1.20),
    entry("IE", "Ireland", "Irland", A, 1.15, 1.10),
    entry("LU", "Luxembourg", "Luxemburg", A, 1.20, 1.10),
    entry("LI", "Liechtenstein", "Liechtenstein", A, 1.20, 1.15),
    // ── Group B ──────────────────────────────────────────────────────
    entry("AT", "Austria", "Österreich", B, 1.0, 1.0),
    entry("DE", "Germany", "Deutschland", B, 1.0, 1.0),
    entry("FR", "France", "Frankreich", B, 1.0, 1.0),
    entry("NL", "Netherlands", "Niederlande", B, 1.05, 1.0),
    entry("BE", "Belgium", "Belgien", B, 1.0, 1.0),
    entry("IT", "Italy", "Italien", B, 0.90, 0.90),
    // ── Group C ──────────────────────────────────────────────────────
    entry("ES", "Spain", "Spanien", C, 0.80, 0.85),
    entry("PT", "Portugal", "Portugal", C, 0.75, 0.80),
    entry("GR", "Greece", "Griechenland", C, 0.75, 0.80),
    entry("CY", "Cyprus", "Zypern", C, 0.80, 0.85),
    entry("MT", "Malta", "Malta", C, 0.80, 0.85),
    entry("SI", "Slovenia", "Slowenien", C, 0.75, 0.80),
    entry("HR", "Croatia", "Kroatien", C, 0.70, 0.75),
    entry("CZ", "Czech Republic", "Tschechien", C, 0.70, 0.75),
    entry("EE", "Estonia", "Estland", C, 0.70, 0.75),
    entry("LV", "Latvia", "Lettland", C, 0.65, 0.70),
    entry("LT", "Lithuania", "Litauen", C, 0.65, 0.70),
    entry("SK", "Slovakia", "Slowakei", C, 0.65, 0.70),
    entry("PL", "Poland", "Polen", C, 0.65, 0.70),
    entry("HU", "Hungary", "Ungarn", C, 0.65, 0.70),
    // ── Group D ──────────────────────────────────────────────────────
    entry("RS", "Serbia", "Serbien", D, 0.55, 0.60),
    entry("BA", "Bosnia and Herzegovina", "Bosnien u. Herzegowina", D, 0.50, 0.55),
    entry("AL", "Albania", "Albanien", D, 0.45, 0.50),
    entry("ME", "Montenegro", "Montenegro", D, 0.50, 0.55),
    entry("MK", "North Macedonia", "Nordmazedonien", D, 0.45, 0.50),
    entry("XK", "Kosovo", "Kosovo", D, 0.45, 0.50),
    entry("BG", "Bulgaria", "Bulgarien", D, 0.50, 0.55),
    entry("RO", "Romania", "Rumänien", D, 0.55, 0.60),
    entry("TR", "Turkey", "Türkei", D, 0.50, 0.55),
    entry("MD", "Moldova", "Moldau", D, 0.40, 0.45),
    entry("GE", "Georgia", "Georgien", D, 0.40, 0.45),
    entry("UA", "Ukraine", "Ukraine", D, 0.40, 0.45),
    entry("AM", "Armenia", "Armenien", D, 0.40, 0.45),
    entry("AZ", "Azerbaijan", "Aserbaidschan", D, 0.40, 0.45),
];

/// Group assigned to codes that are not in the table.
pub const DEFAULT_GROUP: CostGroup = CostGroup::B;

impl Entry {
    fn to_profile(&self) -> CountryProfile {
        CountryProfile {
            code: self.code.to_string(),
            name: self.name.to_string(),
            name_de: self.name_de.to_string(),
            group: self.group,
            staff_multiplier: self.staff,
            travel_multiplier: self.travel,
        }
    }
}

/// Normalize a country code the way the resolver compares it.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Look up the cost profile for a country code (case-insensitive, trimmed).
pub fn get_country_profile(country_code: &str) -> CountryProfile {
    let code = normalize_code(country_code);
    match COUNTRY_TABLE.iter().find(|e| e.code == code) {
        Some(e) => e.to_profile(),
        None => CountryProfile {
            name: code.clone(),
            name_de: code.clone(),
            code,
            group: DEFAULT_GROUP,
            staff_multiplier: 1.0,
            travel_multiplier: 1.0,
        },
    }
}

/// Whether the code is present in the static table.
pub fn is_known_country(country_code: &str) -> bool {
    let code = normalize_code(country_code);
    COUNTRY_TABLE.iter().any(|e| e.code == code)
}

/// All known profiles, sorted by German name.
pub fn country_list() -> Vec<CountryProfile> {
    let mut list: Vec<CountryProfile> = COUNTRY_TABLE.iter().map(Entry::to_profile).collect();
    list.sort_by(|a, b| a.name_de.cmp(&b.name_de));
    list
}
