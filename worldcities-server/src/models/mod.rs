//! Reference-data records and their list projections

mod city;
mod country;

pub use city::{City, CityListing};
pub use country::{Country, CountryListing};

use serde::{de::DeserializeOwned, Serialize};

use crate::paging::{Field, Record};

/// A record type exposed as a CRUD resource under `/api/{COLLECTION}`
pub trait Entity: Record + Clone + Serialize + DeserializeOwned {
    /// Row shape returned by the list endpoint
    type Listing: Record + Clone + Serialize;

    /// Singular name used in messages and logs
    const KIND: &'static str;

    /// Path segment and table name
    const COLLECTION: &'static str;

    /// Query parameter naming the record id in a dupe check (`countryId`, `cityId`)
    const ID_PARAM: &'static str;

    /// Listing sort column when the request names none
    const DEFAULT_SORT: &'static str = "name";

    /// Fields whose values must be unique across records
    const DUPE_FIELDS: &'static [&'static str];

    /// Same record carrying a different id
    fn with_id(self, id: i32) -> Self;

    /// Resolve `name` to a field that takes part in duplicate checks
    fn dupe_field(name: &str) -> Option<&'static Field<Self>> {
        Self::field(name).filter(|field| Self::DUPE_FIELDS.contains(&field.name()))
    }

    /// All duplicate-check fields, in declaration order
    fn dupe_fields() -> impl Iterator<Item = &'static Field<Self>> {
        Self::FIELDS
            .iter()
            .filter(|field| Self::DUPE_FIELDS.contains(&field.name()))
    }
}
