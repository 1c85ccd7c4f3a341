use serde::{Deserialize, Serialize};

use super::Entity;
use crate::paging::{Field, Record};

/// A country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Country {
    /// Store-assigned identity; ignored on create
    #[serde(default)]
    pub id: i32,
    /// Display name
    pub name: String,
    /// ISO 3166-1 alpha-2 code
    pub iso2: String,
    /// ISO 3166-1 alpha-3 code
    pub iso3: String,
}

impl Country {
    /// A country that has not been stored yet
    pub fn new(name: impl Into<String>, iso2: impl Into<String>, iso3: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            iso2: iso2.into(),
            iso3: iso3.into(),
        }
    }
}

impl Record for Country {
    const FIELDS: &'static [Field<Self>] = &[
        Field::integer("id", "id", |c| i64::from(c.id)),
        Field::text("name", "name", |c| &c.name),
        Field::text("iso2", "iso2", |c| &c.iso2),
        Field::text("iso3", "iso3", |c| &c.iso3),
    ];

    fn id(&self) -> i32 {
        self.id
    }
}

impl Entity for Country {
    type Listing = CountryListing;

    const KIND: &'static str = "country";
    const COLLECTION: &'static str = "countries";
    const ID_PARAM: &'static str = "countryId";
    const DUPE_FIELDS: &'static [&'static str] = &["name", "iso2", "iso3"];

    fn with_id(self, id: i32) -> Self {
        Self { id, ..self }
    }
}

/// A country row in the list view, with its number of cities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CountryListing {
    /// Country id
    pub id: i32,
    /// Display name
    pub name: String,
    /// ISO 3166-1 alpha-2 code
    pub iso2: String,
    /// ISO 3166-1 alpha-3 code
    pub iso3: String,
    /// Number of cities referencing the country
    pub tot_cities: i64,
}

impl CountryListing {
    /// Project a country with its city count
    pub fn new(country: &Country, tot_cities: i64) -> Self {
        Self {
            id: country.id,
            name: country.name.clone(),
            iso2: country.iso2.clone(),
            iso3: country.iso3.clone(),
            tot_cities,
        }
    }
}

impl Record for CountryListing {
    const FIELDS: &'static [Field<Self>] = &[
        Field::integer("id", "id", |c| i64::from(c.id)),
        Field::text("name", "name", |c| &c.name),
        Field::text("iso2", "iso2", |c| &c.iso2),
        Field::text("iso3", "iso3", |c| &c.iso3),
        Field::integer("totCities", "tot_cities", |c| c.tot_cities),
    ];

    fn id(&self) -> i32 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_body_without_id() {
        let country: Country =
            serde_json::from_str(r#"{"name":"Italy","iso2":"IT","iso3":"ITA"}"#).unwrap();
        assert_eq!(country, Country::new("Italy", "IT", "ITA"));
    }

    #[test]
    fn test_listing_serializes_tot_cities() {
        let country = Country::new("Italy", "IT", "ITA").with_id(4);
        let json = serde_json::to_value(CountryListing::new(&country, 12)).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["totCities"], 12);
    }

    #[test]
    fn test_listing_sorts_by_snake_case_column() {
        assert_eq!(
            CountryListing::field("tot_cities").map(|f| f.name()),
            Some("totCities")
        );
    }
}
