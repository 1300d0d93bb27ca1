/// Collection and field names shared by the ingestion chain and the queries

// Collections
pub const INTAKE_COLLECTION: &str = "new";
pub const STAGING_COLLECTION: &str = "new_2";
pub const ANALYTICS_COLLECTION: &str = "eu";
pub const CPV_COLLECTION: &str = "cpv";
pub const ISO_CODES_COLLECTION: &str = "iso_codes";

// Contract fields (upper-case dataset columns)
pub const ID: &str = "_id";
pub const VALUE_EURO: &str = "VALUE_EURO";
pub const AWARD_VALUE_EURO: &str = "AWARD_VALUE_EURO";
pub const NUMBER_OFFERS: &str = "NUMBER_OFFERS";
pub const CPV: &str = "CPV";
pub const N_CPV: &str = "nCPV";
pub const CPV_DIVISION: &str = "CPV_DIVISION";
pub const YEAR: &str = "YEAR";
pub const ISO_COUNTRY_CODE: &str = "ISO_COUNTRY_CODE";
pub const B_EU_FUNDS: &str = "B_EU_FUNDS";
pub const CAE_NAME: &str = "CAE_NAME";
pub const CAE_ADDRESS: &str = "CAE_ADDRESS";
pub const CAE_TOWN: &str = "CAE_TOWN";
pub const WIN_NAME: &str = "WIN_NAME";
pub const DT_DISPATCH: &str = "DT_DISPATCH";
pub const DT_AWARD: &str = "DT_AWARD";
pub const ADDRESS: &str = "ADDRESS";
pub const PAIR: &str = "PAIR";

// Reference collection fields
pub const CPV_DIVISION_KEY: &str = "cpv_division";
pub const CPV_DIVISION_DESCRIPTION: &str = "cpv_division_description";
pub const COUNTRY_NAME: &str = "name";
pub const ALPHA_2: &str = "alpha-2";
pub const ALPHA_3: &str = "alpha-3";

/// Codes below this lost their leading zero when stored as numbers.
pub const CPV_LEADING_ZERO_THRESHOLD: i64 = 10_000_000;

pub const EU_FUNDED: &str = "Y";
pub const NOT_EU_FUNDED: &str = "N";

/// Countries covered by the dashboard.
pub const DEFAULT_COUNTRIES: [&str; 33] = [
    "NO", "HR", "HU", "CH", "CZ", "RO", "LV", "GR", "GB", "SI", "LT", "ES", "FR", "IE", "SE",
    "NL", "PT", "PL", "DK", "MK", "DE", "IT", "BG", "CY", "AT", "LU", "BE", "FI", "EE", "SK",
    "MT", "LI", "IS",
];

pub const LEGACY_UK_CODE: &str = "UK";
pub const CURRENT_UK_CODE: &str = "GB";

pub const DEFAULT_MIN_YEAR: i64 = 2008;
pub const DEFAULT_MAX_YEAR: i64 = 2020;
pub const DEFAULT_VALUE_CEILING: f64 = 100_000_000.0;

pub const TOP_N: usize = 5;
pub const TREEMAP_LIMIT: usize = 15;
pub const DEFAULT_HISTOGRAM_DIVISION: &str = "50";

/// `[0, 100_000, ..., 1_000_000]`
pub fn histogram_boundaries() -> Vec<f64> {
    (0..=10).map(|step| f64::from(step) * 100_000.0).collect()
}

pub const HISTOGRAM_OVERFLOW_BUCKET: i64 = 1_000_000;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "TED_INSIGHTS_CONFIG";
