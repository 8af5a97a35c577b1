//! Schema resolution: which column layout and which endpoint apply to a date.
//!
//! The exchange switched from its legacy 13-column bhav copy to the unified
//! (UDiFF) 34-column layout on a single cutover date. Everything on or after the
//! cutover is unified; everything before it is legacy. Resolution is a pure
//! function of the date and never fails.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default first date of the unified layout.
pub const DEFAULT_CUTOVER: NaiveDate = match NaiveDate::from_ymd_opt(2024, 7, 8) {
    Some(d) => d,
    None => NaiveDate::MIN,
};

pub const DEFAULT_LEGACY_URL: &str = "https://nsearchives.nseindia.com/content/historical/EQUITIES/{year}/{month}/cm{day}{month}{year}bhav.csv.zip";
pub const DEFAULT_UNIFIED_URL: &str =
    "https://nsearchives.nseindia.com/content/cm/BhavCopy_NSE_CM_0_0_0_{date}_F_0000.csv.zip";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://www.nseindia.com/";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-IN,en;q=0.5";

/// Which raw layout a payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    Legacy,
    Unified,
}

impl SchemaVariant {
    /// Raw-column → canonical-field mapping for this layout.
    pub fn column_map(self) -> &'static [(&'static str, CanonicalField)] {
        match self {
            Self::Legacy => &LEGACY_COLUMNS,
            Self::Unified => &UNIFIED_COLUMNS,
        }
    }

    /// Placeholders an endpoint template for this layout must contain.
    pub fn required_placeholders(self) -> &'static [&'static str] {
        match self {
            Self::Legacy => &["{day}", "{month}", "{year}"],
            Self::Unified => &["{date}"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Unified => "unified",
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical field a raw column maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    /// Present in the payload but discarded: the requested date always wins.
    TradingDate,
    Symbol,
    Series,
    Open,
    High,
    Low,
    Close,
    LastPrice,
    PrevClose,
    Volume,
    Turnover,
    TotalTrades,
    Isin,
}

const LEGACY_COLUMNS: [(&str, CanonicalField); 13] = [
    ("SYMBOL", CanonicalField::Symbol),
    ("SERIES", CanonicalField::Series),
    ("OPEN", CanonicalField::Open),
    ("HIGH", CanonicalField::High),
    ("LOW", CanonicalField::Low),
    ("CLOSE", CanonicalField::Close),
    ("LAST", CanonicalField::LastPrice),
    ("PREVCLOSE", CanonicalField::PrevClose),
    ("TOTTRDQTY", CanonicalField::Volume),
    ("TOTTRDVAL", CanonicalField::Turnover),
    ("TIMESTAMP", CanonicalField::TradingDate),
    ("TOTALTRADES", CanonicalField::TotalTrades),
    ("ISIN", CanonicalField::Isin),
];

const UNIFIED_COLUMNS: [(&str, CanonicalField); 13] = [
    ("TckrSymb", CanonicalField::Symbol),
    ("SctySrs", CanonicalField::Series),
    ("OpnPric", CanonicalField::Open),
    ("HghPric", CanonicalField::High),
    ("LwPric", CanonicalField::Low),
    ("ClsPric", CanonicalField::Close),
    ("LastPric", CanonicalField::LastPrice),
    ("PrvsClsgPric", CanonicalField::PrevClose),
    ("TtlTradgVol", CanonicalField::Volume),
    ("TtlTrfVal", CanonicalField::Turnover),
    ("TradDt", CanonicalField::TradingDate),
    ("TtlNbOfTxsExctd", CanonicalField::TotalTrades),
    ("ISIN", CanonicalField::Isin),
];

// ── Source configuration ─────────────────────────────────────────────

/// Where and how bhav copies are retrieved. Deserialized from the `[source]`
/// table of the config file; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub cutover: NaiveDate,
    pub legacy_url: String,
    pub unified_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub referer: String,
    pub accept_language: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            cutover: DEFAULT_CUTOVER,
            legacy_url: DEFAULT_LEGACY_URL.to_string(),
            unified_url: DEFAULT_UNIFIED_URL.to_string(),
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

// ── Resolver ─────────────────────────────────────────────────────────

/// The layout, endpoint and mapping that apply to one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchema<'a> {
    pub variant: SchemaVariant,
    pub endpoint_template: &'a str,
    pub column_map: &'static [(&'static str, CanonicalField)],
}

impl ResolvedSchema<'_> {
    /// Concrete URL for `date`.
    pub fn endpoint(&self, date: NaiveDate) -> String {
        render_template(self.endpoint_template, date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaResolver {
    cutover: NaiveDate,
    legacy_template: String,
    unified_template: String,
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

impl SchemaResolver {
    pub fn new(
        cutover: NaiveDate,
        legacy_template: impl Into<String>,
        unified_template: impl Into<String>,
    ) -> Self {
        Self {
            cutover,
            legacy_template: legacy_template.into(),
            unified_template: unified_template.into(),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            config.cutover,
            config.legacy_url.clone(),
            config.unified_url.clone(),
        )
    }

    pub fn cutover(&self) -> NaiveDate {
        self.cutover
    }

    pub fn variant_for(&self, date: NaiveDate) -> SchemaVariant {
        if date >= self.cutover {
            SchemaVariant::Unified
        } else {
            SchemaVariant::Legacy
        }
    }

    pub fn resolve(&self, date: NaiveDate) -> ResolvedSchema<'_> {
        let variant = self.variant_for(date);
        let endpoint_template = match variant {
            SchemaVariant::Legacy => self.legacy_template.as_str(),
            SchemaVariant::Unified => self.unified_template.as_str(),
        };
        ResolvedSchema {
            variant,
            endpoint_template,
            column_map: variant.column_map(),
        }
    }

    pub fn url_for(&self, date: NaiveDate) -> String {
        self.resolve(date).endpoint(date)
    }
}

/// Substitute `{date}` (YYYYMMDD), `{year}`, `{month}` (upper-case three-letter
/// month, e.g. `JAN`) and `{day}` (two digits).
pub fn render_template(template: &str, date: NaiveDate) -> String {
    let month = date.format("%b").to_string().to_uppercase();
    template
        .replace("{date}", &date.format("%Y%m%d").to_string())
        .replace("{year}", &date.format("%Y").to_string())
        .replace("{month}", &month)
        .replace("{day}", &date.format("%d").to_string())
}
