//! Per-source data shapes and the reconciled record.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Catalog object identifier as returned by the search endpoint.
pub type ObjectId = u64;

/// A single spreadsheet cell value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
}

impl CellValue {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) => None,
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Non-image output columns, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CatalogField {
    ObjectId,
    ObjectName,
    Title,
    ObjectBeginDate,
    ObjectEndDate,
    ObjectDate,
    Culture,
    Period,
    Dynasty,
    Reign,
    ArtistDisplayName,
    ArtistDisplayBio,
    Medium,
    Dimensions,
    Classification,
    Department,
    CreditLine,
    Repository,
    ObjectUrl,
    LongDescription,
    ArtworkOverviewText,
    SignaturesInscriptionsMarkingsText,
    ProvenanceText,
    ReferencesText,
}

impl CatalogField {
    pub const ALL: [CatalogField; 24] = [
        Self::ObjectId,
        Self::ObjectName,
        Self::Title,
        Self::ObjectBeginDate,
        Self::ObjectEndDate,
        Self::ObjectDate,
        Self::Culture,
        Self::Period,
        Self::Dynasty,
        Self::Reign,
        Self::ArtistDisplayName,
        Self::ArtistDisplayBio,
        Self::Medium,
        Self::Dimensions,
        Self::Classification,
        Self::Department,
        Self::CreditLine,
        Self::Repository,
        Self::ObjectUrl,
        Self::LongDescription,
        Self::ArtworkOverviewText,
        Self::SignaturesInscriptionsMarkingsText,
        Self::ProvenanceText,
        Self::ReferencesText,
    ];

    /// Column header, matching the API key where the field comes from the API.
    pub fn header(self) -> &'static str {
        match self {
            Self::ObjectId => "objectID",
            Self::ObjectName => "objectName",
            Self::Title => "title",
            Self::ObjectBeginDate => "objectBeginDate",
            Self::ObjectEndDate => "objectEndDate",
            Self::ObjectDate => "objectDate",
            Self::Culture => "culture",
            Self::Period => "period",
            Self::Dynasty => "dynasty",
            Self::Reign => "reign",
            Self::ArtistDisplayName => "artistDisplayName",
            Self::ArtistDisplayBio => "artistDisplayBio",
            Self::Medium => "medium",
            Self::Dimensions => "dimensions",
            Self::Classification => "classification",
            Self::Department => "department",
            Self::CreditLine => "creditLine",
            Self::Repository => "repository",
            Self::ObjectUrl => "objectURL",
            Self::LongDescription => "longDescription",
            Self::ArtworkOverviewText => "artworkOverviewText",
            Self::SignaturesInscriptionsMarkingsText => "signaturesInscriptionsMarkingsText",
            Self::ProvenanceText => "provenanceText",
            Self::ReferencesText => "referencesText",
        }
    }
}

/// One of the four free-text panels on an object page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Panel {
    Overview,
    Signatures,
    Provenance,
    References,
}

impl Panel {
    /// Visible tab label on the object page.
    pub fn default_label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Signatures => "Signatures, Inscriptions, and Markings",
            Self::Provenance => "Provenance",
            Self::References => "References",
        }
    }
}

/// Metadata returned by the object endpoint.
///
/// Every field is optional: an empty record is the documented result of a
/// failed fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRecord {
    pub object_id: Option<i64>,
    pub object_name: Option<String>,
    pub title: Option<String>,
    pub object_begin_date: Option<i64>,
    pub object_end_date: Option<i64>,
    pub object_date: Option<String>,
    pub culture: Option<String>,
    pub period: Option<String>,
    pub dynasty: Option<String>,
    pub reign: Option<String>,
    pub artist_display_name: Option<String>,
    pub artist_display_bio: Option<String>,
    pub medium: Option<String>,
    pub dimensions: Option<String>,
    pub classification: Option<String>,
    pub department: Option<String>,
    pub credit_line: Option<String>,
    pub repository: Option<String>,
    pub object_url: Option<String>,
    pub primary_image: Option<String>,
    pub additional_images: Vec<String>,
}

impl ApiRecord {
    /// Build a record from the endpoint's JSON, tolerating odd types.
    ///
    /// Anything that is not a JSON object yields an empty record.
    pub fn from_json(v: &Value) -> Self {
        if !v.is_object() {
            return Self::default();
        }
        Self {
            object_id: json_int(v, "objectID"),
            object_name: json_text(v, "objectName"),
            title: json_text(v, "title"),
            object_begin_date: json_int(v, "objectBeginDate"),
            object_end_date: json_int(v, "objectEndDate"),
            object_date: json_text(v, "objectDate"),
            culture: json_text(v, "culture"),
            period: json_text(v, "period"),
            dynasty: json_text(v, "dynasty"),
            reign: json_text(v, "reign"),
            artist_display_name: json_text(v, "artistDisplayName"),
            artist_display_bio: json_text(v, "artistDisplayBio"),
            medium: json_text(v, "medium"),
            dimensions: json_text(v, "dimensions"),
            classification: json_text(v, "classification"),
            department: json_text(v, "department"),
            credit_line: json_text(v, "creditLine"),
            repository: json_text(v, "repository"),
            object_url: json_text(v, "objectURL"),
            primary_image: json_text(v, "primaryImage"),
            additional_images: v
                .get("additionalImages")
                .and_then(|a| a.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|u| u.as_str())
                        .filter(|u| !u.is_empty())
                        .map(|u| u.to_string())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Value of an API-sourced catalog column, if the API supplied it.
    ///
    /// Page-derived columns (panels, long description) always return `None`.
    pub fn field(&self, field: CatalogField) -> Option<CellValue> {
        let text = |s: &Option<String>| s.clone().map(CellValue::Text);
        match field {
            CatalogField::ObjectId => self.object_id.map(CellValue::Integer),
            CatalogField::ObjectName => text(&self.object_name),
            CatalogField::Title => text(&self.title),
            CatalogField::ObjectBeginDate => self.object_begin_date.map(CellValue::Integer),
            CatalogField::ObjectEndDate => self.object_end_date.map(CellValue::Integer),
            CatalogField::ObjectDate => text(&self.object_date),
            CatalogField::Culture => text(&self.culture),
            CatalogField::Period => text(&self.period),
            CatalogField::Dynasty => text(&self.dynasty),
            CatalogField::Reign => text(&self.reign),
            CatalogField::ArtistDisplayName => text(&self.artist_display_name),
            CatalogField::ArtistDisplayBio => text(&self.artist_display_bio),
            CatalogField::Medium => text(&self.medium),
            CatalogField::Dimensions => text(&self.dimensions),
            CatalogField::Classification => text(&self.classification),
            CatalogField::Department => text(&self.department),
            CatalogField::CreditLine => text(&self.credit_line),
            CatalogField::Repository => text(&self.repository),
            CatalogField::ObjectUrl => text(&self.object_url),
            CatalogField::LongDescription
            | CatalogField::ArtworkOverviewText
            | CatalogField::SignaturesInscriptionsMarkingsText
            | CatalogField::ProvenanceText
            | CatalogField::ReferencesText => None,
        }
    }
}

fn json_text(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_int(v: &Value, key: &str) -> Option<i64> {
    let value = v.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Text of the four object-page panels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelTexts {
    pub overview: String,
    pub signatures: String,
    pub provenance: String,
    pub references: String,
}

impl PanelTexts {
    pub fn get(&self, panel: Panel) -> &str {
        match panel {
            Panel::Overview => &self.overview,
            Panel::Signatures => &self.signatures,
            Panel::Provenance => &self.provenance,
            Panel::References => &self.references,
        }
    }

    pub fn set(&mut self, panel: Panel, text: String) {
        match panel {
            Panel::Overview => self.overview = text,
            Panel::Signatures => self.signatures = text,
            Panel::Provenance => self.provenance = text,
            Panel::References => self.references = text,
        }
    }

    /// Clear tabs the site rendered as a copy of a sibling tab.
    ///
    /// Signatures identical to Overview and References identical to
    /// Provenance are emptied.
    pub fn drop_cloned_tabs(&mut self) {
        if self.signatures == self.overview {
            self.signatures.clear();
        }
        if self.references == self.provenance {
            self.references.clear();
        }
    }
}

/// Data read from the rendered object page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageData {
    /// URL the browser was pointed at.
    pub page_url: String,
    pub title: String,
    /// Discovered image URLs, de-duplicated, in page order.
    pub image_urls: Vec<String>,
    pub panels: PanelTexts,
}

impl PageData {
    /// The shape returned when the page could not be loaded.
    pub fn empty(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            ..Self::default()
        }
    }
}

/// The reconciled entity for one object, one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// The ID the record was requested for.
    pub object_id: ObjectId,
    pub values: BTreeMap<CatalogField, CellValue>,
    pub primary_image: String,
    pub additional_images: Vec<String>,
}

impl Record {
    /// A row that carries nothing but the object ID.
    pub fn placeholder(object_id: ObjectId) -> Self {
        let mut values = BTreeMap::new();
        values.insert(CatalogField::ObjectId, CellValue::Integer(object_id as i64));
        Self {
            object_id,
            values,
            primary_image: String::new(),
            additional_images: Vec::new(),
        }
    }

    pub fn value(&self, field: CatalogField) -> CellValue {
        self.values.get(&field).cloned().unwrap_or_default()
    }

    pub fn text(&self, field: CatalogField) -> &str {
        self.values
            .get(&field)
            .and_then(|v| v.as_text())
            .unwrap_or("")
    }
}
