use serde::{Deserialize, Serialize};

use super::Entity;
use crate::paging::{Field, Record};

/// A city belonging to a country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct City {
    /// Store-assigned identity; ignored on create
    #[serde(default)]
    pub id: i32,
    /// Display name
    pub name: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Owning country
    pub country_id: i32,
}

impl City {
    /// A city that has not been stored yet
    pub fn new(name: impl Into<String>, lat: f64, lon: f64, country_id: i32) -> Self {
        Self {
            id: 0,
            name: name.into(),
            lat,
            lon,
            country_id,
        }
    }
}

impl Record for City {
    const FIELDS: &'static [Field<Self>] = &[
        Field::integer("id", "id", |c| i64::from(c.id)),
        Field::text("name", "name", |c| &c.name),
        Field::float("lat", "lat", |c| c.lat),
        Field::float("lon", "lon", |c| c.lon),
        Field::integer("countryId", "country_id", |c| i64::from(c.country_id)),
    ];

    fn id(&self) -> i32 {
        self.id
    }
}

impl Entity for City {
    type Listing = CityListing;

    const KIND: &'static str = "city";
    const COLLECTION: &'static str = "cities";
    const ID_PARAM: &'static str = "cityId";
    const DUPE_FIELDS: &'static [&'static str] = &["name", "lat", "lon", "countryId"];

    fn with_id(self, id: i32) -> Self {
        Self { id, ..self }
    }
}

/// A city row in the list view, joined with its country's name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CityListing {
    /// City id
    pub id: i32,
    /// Display name
    pub name: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Owning country
    pub country_id: i32,
    /// Owning country's name
    pub country_name: String,
}

impl CityListing {
    /// Project a city with its country's name
    pub fn new(city: &City, country_name: impl Into<String>) -> Self {
        Self {
            id: city.id,
            name: city.name.clone(),
            lat: city.lat,
            lon: city.lon,
            country_id: city.country_id,
            country_name: country_name.into(),
        }
    }
}

impl Record for CityListing {
    const FIELDS: &'static [Field<Self>] = &[
        Field::integer("id", "id", |c| i64::from(c.id)),
        Field::text("name", "name", |c| &c.name),
        Field::float("lat", "lat", |c| c.lat),
        Field::float("lon", "lon", |c| c.lon),
        Field::integer("countryId", "country_id", |c| i64::from(c.country_id)),
        Field::text("countryName", "country_name", |c| &c.country_name),
    ];

    fn id(&self) -> i32 {
        self.id
    }
}
