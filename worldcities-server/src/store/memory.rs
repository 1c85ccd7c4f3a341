//! In-memory store
//!
//! Both tables live behind a single `tokio::sync::RwLock` so that the
//! cross-table rules (a city must reference an existing country, removing a
//! country removes its cities) are checked and applied atomically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::error::{DatabaseError, DatabaseErrorKind, DatabaseOperation};
use crate::models::{City, CityListing, Country, CountryListing, Entity};
use crate::paging::{count_matching, Condition, PageQuery};

/// The tables held by a [`MemoryStore`]
#[derive(Debug, Default)]
pub struct MemoryTables {
    countries: BTreeMap<i32, Country>,
    cities: BTreeMap<i32, City>,
    last_country_id: i32,
    last_city_id: i32,
}

/// Per-entity access to [`MemoryTables`]
pub trait InMemory: Entity {
    /// The entity's table
    fn table(tables: &MemoryTables) -> &BTreeMap<i32, Self>;

    /// The entity's table, mutably
    fn table_mut(tables: &mut MemoryTables) -> &mut BTreeMap<i32, Self>;

    /// Next identity value
    fn next_id(tables: &mut MemoryTables) -> i32;

    /// Build the listing row of `record`
    fn listing(tables: &MemoryTables, record: &Self) -> Self::Listing;

    /// Reject a record whose references point nowhere
    fn check_references(_tables: &MemoryTables, _record: &Self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Remove rows that depend on record `id`
    fn cascade_delete(_tables: &mut MemoryTables, _id: i32) {}
}

impl InMemory for Country {
    fn table(tables: &MemoryTables) -> &BTreeMap<i32, Self> {
        &tables.countries
    }

    fn table_mut(tables: &mut MemoryTables) -> &mut BTreeMap<i32, Self> {
        &mut tables.countries
    }

    fn next_id(tables: &mut MemoryTables) -> i32 {
        tables.last_country_id += 1;
        tables.last_country_id
    }

    fn listing(tables: &MemoryTables, record: &Self) -> CountryListing {
        let tot_cities = tables
            .cities
            .values()
            .filter(|city| city.country_id == record.id)
            .count();
        CountryListing::new(record, i64::try_from(tot_cities).unwrap_or(i64::MAX))
    }

    fn cascade_delete(tables: &mut MemoryTables, id: i32) {
        tables.cities.retain(|_, city| city.country_id != id);
    }
}

impl InMemory for City {
    fn table(tables: &MemoryTables) -> &BTreeMap<i32, Self> {
        &tables.cities
    }

    fn table_mut(tables: &mut MemoryTables) -> &mut BTreeMap<i32, Self> {
        &mut tables.cities
    }

    fn next_id(tables: &mut MemoryTables) -> i32 {
        tables.last_city_id += 1;
        tables.last_city_id
    }

    fn listing(tables: &MemoryTables, record: &Self) -> CityListing {
        let country_name = tables
            .countries
            .get(&record.country_id)
            .map(|country| country.name.as_str())
            .unwrap_or_default();
        CityListing::new(record, country_name)
    }

    fn check_references(tables: &MemoryTables, record: &Self) -> Result<(), StoreError> {
        if tables.countries.contains_key(&record.country_id) {
            Ok(())
        } else {
            Err(DatabaseError::new(
                DatabaseOperation::Insert,
                DatabaseErrorKind::ConstraintViolation,
                format!("country {} does not exist", record.country_id),
            )
            .add_context(City::COLLECTION)
            .into())
        }
    }
}

/// Store keeping every record in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with records that keep their ids
    ///
    /// Generated ids continue after the largest seeded id.
    pub fn with_records(countries: Vec<Country>, cities: Vec<City>) -> Self {
        let mut tables = MemoryTables::default();
        for country in countries {
            tables.last_country_id = tables.last_country_id.max(country.id);
            tables.countries.insert(country.id, country);
        }
        for city in cities {
            tables.last_city_id = tables.last_city_id.max(city.id);
            tables.cities.insert(city.id, city);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    fn listings<E: InMemory>(tables: &MemoryTables) -> Vec<E::Listing> {
        E::table(tables)
            .values()
            .map(|record| E::listing(tables, record))
            .collect()
    }
}

#[async_trait]
impl<E: InMemory> Store<E> for MemoryStore {
    async fn find(&self, id: i32) -> Result<Option<E>, StoreError> {
        let tables = self.tables.read().await;
        Ok(E::table(&tables).get(&id).cloned())
    }

    async fn exists(&self, id: i32) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(E::table(&tables).contains_key(&id))
    }

    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        let mut tables = self.tables.write().await;
        E::check_references(&tables, &entity)?;

        let id = E::next_id(&mut tables);
        let stored = entity.with_id(id);
        E::table_mut(&mut tables).insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, entity: E) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let id = entity.id();
        if !E::table(&tables).contains_key(&id) {
            return Err(StoreError::Conflict { kind: E::KIND, id });
        }
        E::check_references(&tables, &entity).map_err(|e| e.during(DatabaseOperation::Update))?;

        E::table_mut(&mut tables).insert(id, entity);
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if E::table_mut(&mut tables).remove(&id).is_none() {
            return Ok(false);
        }
        E::cascade_delete(&mut tables, id);
        Ok(true)
    }

    async fn any_match(
        &self,
        conditions: &[Condition<E>],
        exclude_id: i32,
    ) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(E::table(&tables).values().any(|record| {
            record.id() != exclude_id && conditions.iter().all(|c| c.equals(record))
        }))
    }

    async fn count_listing(
        &self,
        filter: Option<&Condition<E::Listing>>,
    ) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        let listings = Self::listings::<E>(&tables);
        Ok(count_matching(listings.iter(), filter))
    }

    async fn fetch_listing(
        &self,
        query: &PageQuery<E::Listing>,
    ) -> Result<Vec<E::Listing>, StoreError> {
        let tables = self.tables.read().await;
        let listings = Self::listings::<E>(&tables);
        Ok(query.apply(listings.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::{PageRequest, Record, SortOrder};

    fn seeded() -> MemoryStore {
        MemoryStore::with_records(
            vec![
                Country::new("Italy", "IT", "ITA").with_id(1),
                Country::new("France", "FR", "FRA").with_id(2),
            ],
            vec![
                City::new("Rome", 41.8933, 12.4829, 1).with_id(1),
                City::new("Milan", 45.4669, 9.19, 1).with_id(2),
                City::new("Paris", 48.8567, 2.3522, 2).with_id(3),
            ],
        )
    }

    #[tokio::test]
    async fn test_insert_ignores_incoming_id() {
        let store = seeded();
        let stored = Store::<Country>::insert(&store, Country::new("Spain", "ES", "ESP").with_id(77))
            .await
            .unwrap();

        assert_eq!(stored.id, 3);
        assert!(Store::<Country>::exists(&store, 3).await.unwrap());
        assert!(!Store::<Country>::exists(&store, 77).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_city_requires_country() {
        let store = seeded();
        let err = Store::<City>::insert(&store, City::new("Atlantis", 0.0, 0.0, 99))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Database(DatabaseError {
                kind: DatabaseErrorKind::ConstraintViolation,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_row_conflicts() {
        let store = seeded();
        let err = Store::<Country>::update(&store, Country::new("Nowhere", "NW", "NWH").with_id(42))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict { kind: "country", id: 42 }));
    }

    #[tokio::test]
    async fn test_delete_country_removes_its_cities() {
        let store = seeded();
        assert!(Store::<Country>::delete(&store, 1).await.unwrap());
        assert!(!Store::<Country>::delete(&store, 1).await.unwrap());

        assert!(!Store::<City>::exists(&store, 1).await.unwrap());
        assert!(Store::<City>::exists(&store, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_listings_are_projected() {
        let store = seeded();
        let query = PageQuery::<CountryListing>::resolve(
            &PageRequest::new(0, 10).with_sort("totCities", SortOrder::Desc),
            "name",
        )
        .unwrap();

        let rows = Store::<Country>::fetch_listing(&store, &query).await.unwrap();
        assert_eq!(rows[0].name, "Italy");
        assert_eq!(rows[0].tot_cities, 2);
        assert_eq!(rows[1].tot_cities, 1);

        let filter = CityListing::field("countryName")
            .and_then(|field| Condition::parse(field, "fran"))
            .unwrap();
        let count = Store::<City>::count_listing(&store, Some(&filter)).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_any_match_excludes_own_id() {
        let store = seeded();
        let name = Country::dupe_field("name").unwrap();
        let italy = [Condition::parse(name, "italy").unwrap()];

        assert!(Store::<Country>::any_match(&store, &italy, 0).await.unwrap());
        assert!(!Store::<Country>::any_match(&store, &italy, 1).await.unwrap());
    }
}
