//! Wire schemas for the search and detail responses
//!
//! Responses are deserialized into these types and then validated into the crate's own
//! models. Required fields that are missing become `ApiError`s; optional fields that are
//! missing, null or of an unexpected type are simply omitted.

use crate::api::ResultPage;
use crate::listing::{ListingDetail, ListingId, ListingSummary, PricingQuote, RateType};
use crate::ApiError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Only sections of this type carry listings
const LISTINGS_SECTION: &str = "listings_ListingsGrid_Explore";

/// Description sections copied from the detail record
const DESCRIPTION_SECTIONS: [&str; 9] = [
    "description",
    "access",
    "space",
    "notes",
    "transit",
    "summary",
    "house_rules",
    "interaction",
    "neighborhood_overview",
];

/// A number the upstream sometimes sends as a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Numeric {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Numeric::Int(n) => Some(*n),
            Numeric::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
            Numeric::Float(_) => None,
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|n| u32::try_from(n).ok())
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Int(n) => Some(*n as f64),
            Numeric::Float(f) => Some(*f),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }
}

// Search response: data.dora.exploreV3

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    dora: Option<Dora>,
}

#[derive(Debug, Deserialize)]
struct Dora {
    #[serde(rename = "exploreV3")]
    explore_v3: Option<ExploreV3>,
}

#[derive(Debug, Deserialize)]
struct ExploreV3 {
    metadata: Option<ExploreMetadata>,
    #[serde(default)]
    sections: Option<Vec<WireSection>>,
}

#[derive(Debug, Deserialize)]
struct ExploreMetadata {
    #[serde(rename = "paginationMetadata")]
    pagination_metadata: Option<PaginationMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationMetadata {
    total_count: Option<Numeric>,
    has_next_page: Option<bool>,
    items_offset: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSection {
    #[serde(default)]
    section_component_type: Option<String>,
    #[serde(default)]
    items: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireListingItem {
    listing: Option<WireListing>,
    pricing_quote: Option<WirePricingQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireListing {
    id: Option<Numeric>,
    avg_rating: Option<Numeric>,
    bathrooms: Option<Numeric>,
    bedrooms: Option<Numeric>,
    beds: Option<Numeric>,
    is_business_travel_ready: Option<bool>,
    city: Option<String>,
    user: Option<WireUser>,
    lat: Option<Numeric>,
    lng: Option<Numeric>,
    name: Option<String>,
    neighborhood_overview: Option<String>,
    person_capacity: Option<Numeric>,
    picture_count: Option<Numeric>,
    contextual_pictures: Option<Vec<WirePicture>>,
    reviews_count: Option<Numeric>,
    room_and_property_type: Option<String>,
    room_type: Option<String>,
    room_type_category: Option<String>,
    star_rating: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct WirePicture {
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePricingQuote {
    rate_with_service_fee: Option<WireAmount>,
    rate_type: Option<String>,
    price: Option<WirePrice>,
    monthly_price_factor: Option<Numeric>,
    weekly_price_factor: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct WireAmount {
    amount: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    total: Option<WireAmount>,
}

/// Validates one search-results page
///
/// Missing pagination metadata is an error for the whole page: `totalCount` and `hasNextPage`
/// are always required, `itemsOffset` whenever another page follows. Listing items that lack an
/// identifier or pricing quote, or that do not deserialize at all, are skipped with a warning.
pub fn parse_search_page(body: &str, context: &str) -> Result<ResultPage, ApiError> {
    let envelope: SearchEnvelope = serde_json::from_str(body).map_err(|e| ApiError::Decode {
        context: context.to_string(),
        message: e.to_string(),
    })?;

    let explore = envelope
        .data
        .and_then(|d| d.dora)
        .and_then(|d| d.explore_v3)
        .ok_or_else(|| ApiError::MissingPagination {
            context: context.to_string(),
        })?;

    let pagination = explore
        .metadata
        .and_then(|m| m.pagination_metadata)
        .ok_or_else(|| ApiError::MissingPagination {
            context: context.to_string(),
        })?;

    let total_count = pagination
        .total_count
        .as_ref()
        .and_then(Numeric::as_u32)
        .ok_or_else(|| ApiError::MissingPagination {
            context: context.to_string(),
        })?;

    let has_next_page = pagination
        .has_next_page
        .ok_or_else(|| ApiError::MissingPagination {
            context: context.to_string(),
        })?;

    // The cursor only matters when another page follows
    let items_offset = match pagination.items_offset.as_ref().and_then(Numeric::as_u32) {
        Some(offset) => offset,
        None if has_next_page => {
            return Err(ApiError::MissingPagination {
                context: context.to_string(),
            })
        }
        None => 0,
    };

    let mut items = Vec::new();
    for section in explore.sections.unwrap_or_default() {
        if section.section_component_type.as_deref() != Some(LISTINGS_SECTION) {
            continue;
        }
        for raw in section.items.unwrap_or_default() {
            match parse_listing_item(raw, context) {
                Ok(summary) => items.push(summary),
                Err(e) => tracing::warn!("Skipping listing item: {}", e),
            }
        }
    }

    Ok(ResultPage {
        total_count,
        has_next_page,
        items_offset,
        items,
    })
}

fn parse_listing_item(raw: Value, context: &str) -> Result<ListingSummary, ApiError> {
    let item: WireListingItem = serde_json::from_value(raw).map_err(|e| ApiError::Decode {
        context: context.to_string(),
        message: e.to_string(),
    })?;

    let missing = |field: &str| ApiError::MissingField {
        field: field.to_string(),
        context: context.to_string(),
    };

    let listing = item.listing.ok_or_else(|| missing("listing"))?;
    let quote = item.pricing_quote.ok_or_else(|| missing("pricingQuote"))?;

    let id = listing
        .id
        .as_ref()
        .and_then(Numeric::as_u64)
        .map(ListingId)
        .ok_or_else(|| missing("listing.id"))?;
    let rate_type = quote
        .rate_type
        .as_deref()
        .map(RateType::from_api)
        .ok_or_else(|| missing("pricingQuote.rateType"))?;

    let pricing = PricingQuote {
        rate: amount(quote.rate_with_service_fee.as_ref()),
        rate_type,
        total: amount(quote.price.as_ref().and_then(|p| p.total.as_ref())),
        monthly_price_factor: quote.monthly_price_factor.as_ref().and_then(Numeric::as_f64),
        weekly_price_factor: quote.weekly_price_factor.as_ref().and_then(Numeric::as_f64),
    };

    let mut summary = ListingSummary::new(id, pricing);
    summary.name = listing.name;
    summary.city = listing.city;
    summary.avg_rating = listing.avg_rating.as_ref().and_then(Numeric::as_f64);
    summary.star_rating = listing.star_rating.as_ref().and_then(Numeric::as_f64);
    summary.review_count = listing.reviews_count.as_ref().and_then(Numeric::as_u32);
    summary.bathrooms = listing.bathrooms.as_ref().and_then(Numeric::as_f64);
    summary.bedrooms = listing.bedrooms.as_ref().and_then(Numeric::as_u32);
    summary.beds = listing.beds.as_ref().and_then(Numeric::as_u32);
    summary.person_capacity = listing.person_capacity.as_ref().and_then(Numeric::as_u32);
    summary.business_travel_ready = listing.is_business_travel_ready;
    summary.host_id = listing
        .user
        .and_then(|u| u.id)
        .as_ref()
        .and_then(Numeric::as_u64);
    summary.latitude = listing.lat.as_ref().and_then(Numeric::as_f64);
    summary.longitude = listing.lng.as_ref().and_then(Numeric::as_f64);
    summary.neighborhood_overview = listing.neighborhood_overview;
    summary.photo_count = listing.picture_count.as_ref().and_then(Numeric::as_u32);
    summary.photos = listing
        .contextual_pictures
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.picture)
        .collect();
    summary.room_and_property_type = listing.room_and_property_type;
    summary.room_type = listing.room_type;
    summary.room_type_category = listing.room_type_category;

    Ok(summary)
}

fn amount(value: Option<&WireAmount>) -> Option<f64> {
    value
        .and_then(|a| a.amount.as_ref())
        .and_then(Numeric::as_f64)
}

// Detail response: { "pdp_listing_detail": { ... } }

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    pdp_listing_detail: Option<WireDetail>,
}

#[derive(Debug, Deserialize)]
struct WireDetail {
    name: Option<String>,
    location_title: Option<String>,
    localized_city: Option<String>,
    room_and_property_type: Option<String>,
    lat: Option<Numeric>,
    lng: Option<Numeric>,
    reviews_module: Option<WireReviewsModule>,
    review_details_interface: Option<WireReviewDetails>,
    primary_host: Option<WireHost>,
    sectioned_description: Option<BTreeMap<String, Value>>,
    guest_label: Option<String>,
    bathroom_label: Option<String>,
    bedroom_label: Option<String>,
    bed_label: Option<String>,
    photos: Option<Vec<WirePhoto>>,
}

#[derive(Debug, Deserialize)]
struct WireReviewsModule {
    localized_overall_rating: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireReviewDetails {
    review_count: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct WireHost {
    host_name: Option<String>,
    id: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct WirePhoto {
    large: Option<String>,
}

/// Validates one listing-detail response
///
/// A missing `pdp_listing_detail` object, or a missing name, location title or
/// room-and-property type, is an error. Labels such as `"2 guests"` keep only their first
/// token; photo URLs lose their query string.
pub fn parse_listing_detail(body: &str, id: ListingId) -> Result<ListingDetail, ApiError> {
    let context = format!("listing {}", id);

    let envelope: DetailEnvelope = serde_json::from_str(body).map_err(|e| ApiError::Decode {
        context: context.clone(),
        message: e.to_string(),
    })?;

    let missing = |field: &str| ApiError::MissingField {
        field: field.to_string(),
        context: context.clone(),
    };

    let detail = envelope
        .pdp_listing_detail
        .ok_or_else(|| missing("pdp_listing_detail"))?;

    let name = detail.name.ok_or_else(|| missing("name"))?;
    let location = detail
        .location_title
        .ok_or_else(|| missing("location_title"))?;
    let room_and_property_type = detail
        .room_and_property_type
        .ok_or_else(|| missing("room_and_property_type"))?;

    let rating = detail
        .reviews_module
        .and_then(|m| m.localized_overall_rating)
        .and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    let description = detail
        .sectioned_description
        .map(|sections| {
            DESCRIPTION_SECTIONS
                .iter()
                .filter_map(|key| match sections.get(*key) {
                    Some(Value::String(text)) => Some((key.to_string(), text.clone())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let (host_name, host_id) = match detail.primary_host {
        Some(host) => (host.host_name, host.id.as_ref().and_then(Numeric::as_u64)),
        None => (None, None),
    };

    Ok(ListingDetail {
        name,
        location,
        room_and_property_type,
        city: detail.localized_city,
        latitude: detail.lat.as_ref().and_then(Numeric::as_f64),
        longitude: detail.lng.as_ref().and_then(Numeric::as_f64),
        rating,
        review_count: detail
            .review_details_interface
            .and_then(|r| r.review_count)
            .as_ref()
            .and_then(Numeric::as_u32),
        host_name,
        host_id,
        description,
        guests: first_token(detail.guest_label),
        bathrooms: first_token(detail.bathroom_label),
        bedrooms: first_token(detail.bedroom_label),
        beds: first_token(detail.bed_label),
        photos: detail
            .photos
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.large)
            .map(|url| strip_query(&url))
            .collect(),
    })
}

fn first_token(label: Option<String>) -> Option<String> {
    label.and_then(|l| l.split(' ').next().map(str::to_string))
}

fn strip_query(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_body(total: u32, has_next: bool, offset: u32, items: Vec<Value>) -> String {
        json!({
            "data": { "dora": { "exploreV3": {
                "metadata": { "paginationMetadata": {
                    "totalCount": total, "hasNextPage": has_next, "itemsOffset": offset
                }},
                "sections": [
                    { "sectionComponentType": "explore_header", "items": [ { "title": "x" } ] },
                    { "sectionComponentType": "listings_ListingsGrid_Explore", "items": items }
                ]
            }}}
        })
        .to_string()
    }

    fn item(id: u64, rate: Option<f64>, rate_type: &str) -> Value {
        json!({
            "listing": {
                "id": id,
                "name": "Bach by the sea",
                "city": "Piha",
                "avgRating": 4.8,
                "bedrooms": 2,
                "reviewsCount": "17",
                "user": { "id": 555 },
                "contextualPictures": [ { "picture": "https://img/1.jpg" } ]
            },
            "pricingQuote": {
                "rateWithServiceFee": rate.map(|r| json!({ "amount": r })).unwrap_or(Value::Null),
                "rateType": rate_type,
                "price": { "total": { "amount": 640.0 } },
                "weeklyPriceFactor": 0.9
            }
        })
    }

    #[test]
    fn test_parse_search_page() {
        let body = search_body(
            120,
            true,
            20,
            vec![item(1, Some(80.0), "nightly"), item(2, None, "monthly")],
        );
        let page = parse_search_page(&body, "test").unwrap();

        assert_eq!(page.total_count, 120);
        assert!(page.has_next_page);
        assert_eq!(page.items_offset, 20);
        assert_eq!(page.items.len(), 2);

        let first = &page.items[0];
        assert_eq!(first.id, ListingId(1));
        assert_eq!(first.pricing.rate, Some(80.0));
        assert_eq!(first.pricing.rate_type, RateType::Nightly);
        assert_eq!(first.pricing.total, Some(640.0));
        assert_eq!(first.review_count, Some(17));
        assert_eq!(first.host_id, Some(555));
        assert_eq!(first.photos, vec!["https://img/1.jpg".to_string()]);

        // Null rate is kept as absent, not an error
        assert_eq!(page.items[1].pricing.rate, None);
        assert!(page.items[1].pricing.rate_type.is_monthly());
    }

    #[test]
    fn test_missing_pagination_is_an_error() {
        let body = json!({ "data": { "dora": { "exploreV3": { "sections": [] } } } }).to_string();
        let err = parse_search_page(&body, "Auckland 0-500").unwrap_err();
        assert_eq!(
            err,
            ApiError::MissingPagination {
                context: "Auckland 0-500".to_string()
            }
        );
    }

    fn body_with_pagination(pagination: Value) -> String {
        json!({ "data": { "dora": { "exploreV3": {
            "metadata": { "paginationMetadata": pagination },
            "sections": []
        }}}})
        .to_string()
    }

    #[test]
    fn test_missing_has_next_page_is_an_error() {
        for pagination in [
            json!({ "totalCount": 250, "itemsOffset": 20 }),
            json!({ "totalCount": 250, "hasNextPage": null, "itemsOffset": 20 }),
        ] {
            let err = parse_search_page(&body_with_pagination(pagination), "ctx").unwrap_err();
            assert_eq!(
                err,
                ApiError::MissingPagination {
                    context: "ctx".to_string()
                }
            );
        }
    }

    #[test]
    fn test_missing_offset_with_next_page_is_an_error() {
        let body = body_with_pagination(json!({ "totalCount": 250, "hasNextPage": true }));
        let err = parse_search_page(&body, "ctx").unwrap_err();
        assert!(matches!(err, ApiError::MissingPagination { .. }));

        let body = body_with_pagination(json!({
            "totalCount": 250, "hasNextPage": true, "itemsOffset": null
        }));
        assert!(parse_search_page(&body, "ctx").is_err());
    }

    #[test]
    fn test_missing_offset_on_last_page_is_accepted() {
        let body = body_with_pagination(json!({ "totalCount": 12, "hasNextPage": false }));
        let page = parse_search_page(&body, "ctx").unwrap();
        assert!(!page.has_next_page);
        assert_eq!(page.total_count, 12);
    }

    #[test]
    fn test_invalid_json_is_a_decode_error() {
        let err = parse_search_page("<html>", "ctx").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn test_items_without_id_or_pricing_are_skipped() {
        let no_id = json!({ "listing": { "name": "x" }, "pricingQuote": { "rateType": "nightly" } });
        let no_quote = json!({ "listing": { "id": 3 } });
        let no_rate_type = json!({ "listing": { "id": 4 }, "pricingQuote": {} });
        let body = search_body(
            4,
            false,
            0,
            vec![no_id, item(5, Some(50.0), "nightly"), no_quote, no_rate_type],
        );

        let page = parse_search_page(&body, "ctx").unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, ListingId(5));
        assert!(!page.has_next_page);
    }

    #[test]
    fn test_parse_listing_detail() {
        let body = json!({
            "pdp_listing_detail": {
                "name": "Harbour view studio",
                "location_title": "Auckland, New Zealand",
                "localized_city": "Auckland",
                "room_and_property_type": "Entire apartment",
                "lat": -36.85,
                "lng": 174.76,
                "reviews_module": { "localized_overall_rating": "4.91" },
                "review_details_interface": { "review_count": 88 },
                "primary_host": { "host_name": "Aroha", "id": 1234 },
                "sectioned_description": {
                    "description": "Sunny studio",
                    "transit": null,
                    "unrelated": "ignored"
                },
                "guest_label": "2 guests",
                "bed_label": "1 bed",
                "photos": [ { "large": "https://img/a.jpg?aki_policy=large" } ]
            }
        })
        .to_string();

        let detail = parse_listing_detail(&body, ListingId(7)).unwrap();
        assert_eq!(detail.name, "Harbour view studio");
        assert_eq!(detail.city.as_deref(), Some("Auckland"));
        assert_eq!(detail.rating.as_deref(), Some("4.91"));
        assert_eq!(detail.review_count, Some(88));
        assert_eq!(detail.host_id, Some(1234));
        assert_eq!(detail.guests.as_deref(), Some("2"));
        assert_eq!(detail.beds.as_deref(), Some("1"));
        assert_eq!(detail.bathrooms, None);
        assert_eq!(detail.photos, vec!["https://img/a.jpg".to_string()]);
        assert_eq!(detail.description.len(), 1);
        assert_eq!(detail.description["description"], "Sunny studio");
    }

    #[test]
    fn test_detail_missing_record_or_mandatory_field() {
        let err = parse_listing_detail("{}", ListingId(7)).unwrap_err();
        assert!(matches!(err, ApiError::MissingField { ref field, .. } if field == "pdp_listing_detail"));

        let body = json!({ "pdp_listing_detail": { "name": "x", "location_title": "y" } })
            .to_string();
        let err = parse_listing_detail(&body, ListingId(7)).unwrap_err();
        assert!(
            matches!(err, ApiError::MissingField { ref field, .. } if field == "room_and_property_type")
        );
    }
}
