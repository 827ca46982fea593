//! Nearby facility search types and list presentation.
//!
//! Search results keep the places provider's relevance order; this crate
//! only truncates them to [`MAX_RESULTS`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::geo::{distance_km, Coordinate};

/// Results kept per search.
pub const MAX_RESULTS: usize = 10;

/// Search radius used when none is configured.
pub const DEFAULT_RADIUS_M: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityCategory {
    Hospital,
    Pharmacy,
}

impl FacilityCategory {
    /// Place type understood by the places provider.
    pub fn place_type(&self) -> &'static str {
        match self {
            Self::Hospital => "hospital",
            Self::Pharmacy => "pharmacy",
        }
    }

    pub fn list_title(&self) -> &'static str {
        match self {
            Self::Hospital => "Nearest Hospitals",
            Self::Pharmacy => "Nearest Medical Stores",
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            Self::Hospital => "No hospitals found nearby.",
            Self::Pharmacy => "No medical stores found nearby.",
        }
    }
}

impl fmt::Display for FacilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.place_type())
    }
}

impl FromStr for FacilityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hospital" | "hospitals" => Ok(Self::Hospital),
            "pharmacy" | "pharmacies" | "medical-store" | "medical-stores" => Ok(Self::Pharmacy),
            other => Err(format!(
                "Unknown category '{}'. Use 'hospital' or 'pharmacy'.",
                other
            )),
        }
    }
}

/// A place returned by a nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub address: String,
    pub coordinate: Coordinate,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub category_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FacilityError {
    #[error("Places service unreachable: {0}")]
    Upstream(String),
    #[error("Places request denied: {0}")]
    RequestDenied(String),
    #[error("Invalid places response: {0}")]
    InvalidResponse(String),
}

/// Nearby facility search.
#[async_trait]
pub trait FacilitySearch: Send + Sync {
    async fn search(
        &self,
        coordinate: Coordinate,
        category: FacilityCategory,
        radius_meters: u32,
    ) -> Result<Vec<Facility>, FacilityError>;
}

/// Keep the first [`MAX_RESULTS`] in provider order.
pub fn cap_results(mut facilities: Vec<Facility>) -> Vec<Facility> {
    facilities.truncate(MAX_RESULTS);
    facilities
}

/// Short label for a facility, picked from its place types.
pub fn badge(category: FacilityCategory, tags: &[String]) -> &'static str {
    let has = |t: &str| tags.iter().any(|tag| tag == t);
    match category {
        FacilityCategory::Pharmacy if has("pharmacy") => "Pharmacy",
        FacilityCategory::Pharmacy if has("drugstore") => "Drugstore",
        FacilityCategory::Pharmacy => "Medical Store",
        FacilityCategory::Hospital if has("hospital") => "Hospital",
        FacilityCategory::Hospital if has("doctor") => "Doctor",
        FacilityCategory::Hospital => "Medical",
    }
}

pub fn directions_url(destination: Coordinate) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&destination={},{}",
        destination.lat, destination.lng
    )
}

/// One rendered list entry.
#[derive(Debug, Clone, Serialize)]
pub struct FacilityRow {
    #[serde(flatten)]
    pub facility: Facility,
    pub distance_km: Option<f64>,
    pub badge: &'static str,
    pub directions_url: String,
}

/// A facility list ready for display, with distances from `origin`.
#[derive(Debug, Clone, Serialize)]
pub struct FacilityListing {
    pub title: &'static str,
    pub category: FacilityCategory,
    pub rows: Vec<FacilityRow>,
}

impl FacilityListing {
    pub fn build(category: FacilityCategory, facilities: Vec<Facility>, origin: Option<Coordinate>) -> Self {
        let rows = facilities
            .into_iter()
            .map(|facility| FacilityRow {
                distance_km: origin.map(|o| distance_km(o, facility.coordinate)),
                badge: badge(category, &facility.category_tags),
                directions_url: directions_url(facility.coordinate),
                facility,
            })
            .collect();

        Self {
            title: category.list_title(),
            category,
            rows,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("{}\n", self.title);
        if self.rows.is_empty() {
            out.push_str(&format!("  {}\n", self.category.empty_message()));
            out.push_str("  Try expanding your search area or checking your location settings.\n");
            return out;
        }

        for (i, row) in self.rows.iter().enumerate() {
            let distance = match row.distance_km {
                Some(d) => format!("{:.1} km away", d),
                None => "N/A".to_string(),
            };
            let rating = match row.facility.rating {
                Some(r) => format!("\u{2605} {}", r),
                None => "Rating: N/A".to_string(),
            };
            out.push_str(&format!(
                "  {:>2}. {} [{}]\n      {}\n      {} | {}\n      {}\n",
                i + 1,
                row.facility.name,
                row.badge,
                row.facility.address,
                distance,
                rating,
                row.directions_url,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(id: &str, lat: f64, lng: f64, tags: &[&str]) -> Facility {
        Facility {
            id: id.into(),
            name: format!("Facility {}", id),
            address: "1 Main St".into(),
            coordinate: Coordinate::new(lat, lng),
            rating: None,
            category_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("hospital".parse::<FacilityCategory>(), Ok(FacilityCategory::Hospital));
        assert_eq!("Medical-Stores".parse::<FacilityCategory>(), Ok(FacilityCategory::Pharmacy));
        assert!("bakery".parse::<FacilityCategory>().is_err());
    }

    #[test]
    fn test_badges() {
        assert_eq!(badge(FacilityCategory::Hospital, &tags(&["hospital", "health"])), "Hospital");
        assert_eq!(badge(FacilityCategory::Hospital, &tags(&["doctor"])), "Doctor");
        assert_eq!(badge(FacilityCategory::Hospital, &tags(&["health"])), "Medical");
        assert_eq!(badge(FacilityCategory::Pharmacy, &tags(&["drugstore", "pharmacy"])), "Pharmacy");
        assert_eq!(badge(FacilityCategory::Pharmacy, &tags(&["drugstore"])), "Drugstore");
        assert_eq!(badge(FacilityCategory::Pharmacy, &[]), "Medical Store");
    }

    #[test]
    fn test_cap_keeps_provider_order() {
        let all: Vec<Facility> = (0..15)
            .map(|i| facility(&i.to_string(), 40.0 + i as f64 * 0.01, -74.0, &[]))
            .rev()
            .collect();
        let capped = cap_results(all);
        assert_eq!(capped.len(), MAX_RESULTS);
        assert_eq!(capped[0].id, "14");
        assert_eq!(capped[9].id, "5");
    }

    #[test]
    fn test_directions_url() {
        assert_eq!(
            directions_url(Coordinate::new(40.7, -74.0)),
            "https://www.google.com/maps/dir/?api=1&destination=40.7,-74"
        );
    }

    #[test]
    fn test_listing_distances_and_render() {
        let origin = Coordinate::new(40.7128, -74.0060);
        let mut near = facility("a", 40.7306, -73.9352, &["hospital"]);
        near.rating = Some(4.2);
        let listing = FacilityListing::build(FacilityCategory::Hospital, vec![near], Some(origin));

        let row = &listing.rows[0];
        assert_eq!(row.distance_km, Some(distance_km(origin, row.facility.coordinate)));
        assert_eq!(row.badge, "Hospital");

        let text = listing.render_text();
        assert!(text.starts_with("Nearest Hospitals"));
        assert!(text.contains("km away"));
        assert!(text.contains("\u{2605} 4.2"));
    }

    #[test]
    fn test_listing_without_origin_or_results() {
        let listing = FacilityListing::build(
            FacilityCategory::Pharmacy,
            vec![facility("b", 1.0, 2.0, &[])],
            None,
        );
        let text = listing.render_text();
        assert!(text.contains("N/A | Rating: N/A"));

        let empty = FacilityListing::build(FacilityCategory::Pharmacy, vec![], None);
        assert!(empty.render_text().contains("No medical stores found nearby."));
    }
}
