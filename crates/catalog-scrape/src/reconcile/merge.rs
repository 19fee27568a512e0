//! Field merge: API metadata + page data + long description -> `Record`.

use crate::model::{ApiRecord, CatalogField, CellValue, ObjectId, PageData, Panel, Record};
use std::collections::BTreeMap;

/// URL the long description is read from: the API's object URL, else the
/// page the browser was pointed at.
pub fn description_url<'a>(api: &'a ApiRecord, page: &'a PageData) -> &'a str {
    non_empty(&api.object_url).unwrap_or(&page.page_url)
}

/// Merge the per-source data for one object into a record.
///
/// Precedence: API values win when present and non-empty; title, object URL
/// and images fall back to the page. Additional images are capped at
/// `max_additional_images`.
pub fn reconcile(
    object_id: ObjectId,
    api: &ApiRecord,
    page: &PageData,
    long_description: &str,
    fields: &[CatalogField],
    max_additional_images: usize,
) -> Record {
    let primary_image = non_empty(&api.primary_image)
        .or_else(|| page.image_urls.first().map(String::as_str))
        .unwrap_or("")
        .to_string();

    let mut additional_images: Vec<String> = if api.additional_images.is_empty() {
        page.image_urls.iter().skip(1).cloned().collect()
    } else {
        api.additional_images.clone()
    };
    additional_images.truncate(max_additional_images);

    let mut values = BTreeMap::new();
    for &field in fields {
        let value = match field {
            CatalogField::ObjectId => CellValue::Integer(api.object_id.unwrap_or(object_id as i64)),
            CatalogField::Title => non_empty(&api.title).unwrap_or(&page.title).into(),
            CatalogField::ObjectUrl => description_url(api, page).into(),
            CatalogField::LongDescription => long_description.into(),
            CatalogField::ArtworkOverviewText => page.panels.get(Panel::Overview).into(),
            CatalogField::SignaturesInscriptionsMarkingsText => {
                page.panels.get(Panel::Signatures).into()
            }
            CatalogField::ProvenanceText => page.panels.get(Panel::Provenance).into(),
            CatalogField::ReferencesText => page.panels.get(Panel::References).into(),
            other => api.field(other).unwrap_or_default(),
        };
        values.insert(field, value);
    }

    Record {
        object_id,
        values,
        primary_image,
        additional_images,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
