//! Add/edit form models for cities and countries
//!
//! A form starts blank ([`CityForm::create`]) or from a stored record
//! ([`CityForm::load`]). Field rules are checked locally; duplicate checks go
//! to the server through a [`DupeValidator`] that restarts on every edit.
//! Submitting creates or updates the record; on failure the form keeps its
//! values and the error message.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use worldcities_server::{
    models::{City, Country, CountryListing, Entity},
    paging::{PageRequest, SortOrder},
};

use crate::api::{Api, CityApi};
use crate::error::Result;
use crate::validator::{DupeValidator, ValidationState};

/// Latitude/longitude: optional minus, digits, up to four decimals
static COORDINATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-]?[0-9]+(\.[0-9]{1,4})?$").expect("coordinate regex is valid")
});

static ISO2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{2}$").expect("ISO2 regex is valid"));

static ISO3: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{3}$").expect("ISO3 regex is valid"));

/// Page size used to fill the country picker in one request
pub const COUNTRY_PICKER_PAGE_SIZE: i64 = 9999;

/// A field rule that does not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// The field is empty
    Required(&'static str),
    /// The field does not have the expected shape
    Pattern(&'static str),
}

impl FieldError {
    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            Self::Required(field) | Self::Pattern(field) => field,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required(field) => write!(f, "{} is required", field),
            Self::Pattern(field) => write!(f, "{} is not valid", field),
        }
    }
}

/// Result of submitting a form
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome<E> {
    /// Stored; the caller leaves the form
    Submitted(E),
    /// Field rules failed; nothing was sent
    Invalid(Vec<FieldError>),
    /// The duplicate check did not pass; nothing was sent
    Blocked(ValidationState),
    /// The server refused the write; the message is also kept on the form
    Rejected(String),
}

fn check_required(field: &'static str, value: &str, errors: &mut Vec<FieldError>) -> bool {
    if value.trim().is_empty() {
        errors.push(FieldError::Required(field));
        false
    } else {
        true
    }
}

fn check_pattern(field: &'static str, value: &str, pattern: &Regex, errors: &mut Vec<FieldError>) {
    if check_required(field, value, errors) && !pattern.is_match(value.trim()) {
        errors.push(FieldError::Pattern(field));
    }
}

/// Countries for the city form's picker, all of them, by name
pub async fn load_countries<A>(api: &A) -> Result<Vec<CountryListing>>
where
    A: Api<Country> + ?Sized,
{
    let request =
        PageRequest::new(0, COUNTRY_PICKER_PAGE_SIZE).with_sort("name", SortOrder::Asc);
    Ok(api.list(&request).await?.data)
}

/// Add/edit form of a city
#[derive(Debug, Clone)]
pub struct CityForm {
    id: Option<i32>,
    title: String,
    name: String,
    lat: String,
    lon: String,
    country_id: Option<i32>,
    countries: Vec<CountryListing>,
    dupe: DupeValidator,
    error: Option<String>,
}

impl CityForm {
    fn blank(countries: Vec<CountryListing>) -> Self {
        Self {
            id: None,
            title: "Create a new City".to_string(),
            name: String::new(),
            lat: String::new(),
            lon: String::new(),
            country_id: None,
            countries,
            dupe: DupeValidator::new(),
            error: None,
        }
    }

    /// Empty form for a new city
    pub async fn create<A: CityApi + ?Sized>(api: &A) -> Result<Self> {
        Ok(Self::blank(load_countries(api).await?))
    }

    /// Form editing city `id`
    pub async fn load<A: CityApi + ?Sized>(api: &A, id: i32) -> Result<Self> {
        let countries = load_countries(api).await?;
        let city = Api::<City>::get(api, id).await?;

        let mut form = Self::blank(countries);
        form.id = Some(city.id);
        form.title = format!("Edit - {}", city.name);
        form.name = city.name;
        form.lat = city.lat.to_string();
        form.lon = city.lon.to_string();
        form.country_id = Some(city.country_id);
        Ok(form)
    }

    /// Id of the city being edited; `None` when creating
    pub fn id(&self) -> Option<i32> {
        self.id
    }

    /// View title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Name control
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latitude control
    pub fn lat(&self) -> &str {
        &self.lat
    }

    /// Longitude control
    pub fn lon(&self) -> &str {
        &self.lon
    }

    /// Selected country
    pub fn country_id(&self) -> Option<i32> {
        self.country_id
    }

    /// Picker entries
    pub fn countries(&self) -> &[CountryListing] {
        &self.countries
    }

    /// State of the whole-record duplicate check
    pub fn dupe_state(&self) -> &ValidationState {
        self.dupe.state()
    }

    /// Last submit error
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Edit the name
    pub fn set_name(&mut self, value: impl Into<String>) {
        self.name = value.into();
        self.dupe.reset();
    }

    /// Edit the latitude
    pub fn set_lat(&mut self, value: impl Into<String>) {
        self.lat = value.into();
        self.dupe.reset();
    }

    /// Edit the longitude
    pub fn set_lon(&mut self, value: impl Into<String>) {
        self.lon = value.into();
        self.dupe.reset();
    }

    /// Pick a country
    pub fn set_country_id(&mut self, country_id: i32) {
        self.country_id = Some(country_id);
        self.dupe.reset();
    }

    /// Broken field rules
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required("name", &self.name, &mut errors);
        check_pattern("lat", &self.lat, &COORDINATE, &mut errors);
        check_pattern("lon", &self.lon, &COORDINATE, &mut errors);
        if self.country_id.is_none() {
            errors.push(FieldError::Required("countryId"));
        }
        errors
    }

    /// The record the form describes, when every field parses
    pub fn to_city(&self) -> Option<City> {
        let lat = self.lat.trim().parse().ok()?;
        let lon = self.lon.trim().parse().ok()?;
        let city = City::new(self.name.trim(), lat, lon, self.country_id?);
        Some(city.with_id(self.id.unwrap_or(0)))
    }

    /// Ask the server whether another city matches this one
    ///
    /// Skipped (state back to idle) while field rules fail.
    pub async fn check_dupe<A: CityApi + ?Sized>(&mut self, api: &A) -> &ValidationState {
        match self.to_city() {
            Some(city) if self.field_errors().is_empty() => {
                self.dupe.check(api.is_dupe_city(&city)).await
            }
            _ => {
                self.dupe.reset();
                self.dupe.state()
            }
        }
    }

    /// Create or update the city
    pub async fn submit<A: CityApi + ?Sized>(&mut self, api: &A) -> SubmitOutcome<City> {
        let errors = self.field_errors();
        let Some(city) = self.to_city().filter(|_| errors.is_empty()) else {
            return SubmitOutcome::Invalid(errors);
        };

        if *self.dupe.state() == ValidationState::Idle {
            self.check_dupe(api).await;
        }
        if self.dupe.state().blocks_submit() {
            return SubmitOutcome::Blocked(self.dupe.state().clone());
        }

        let saved = match self.id {
            Some(_) => Api::<City>::update(api, &city).await.map(|()| city),
            None => Api::<City>::create(api, &city).await,
        };
        settle(&mut self.error, saved)
    }
}

/// Add/edit form of a country
#[derive(Debug, Clone)]
pub struct CountryForm {
    id: Option<i32>,
    title: String,
    name: String,
    iso2: String,
    iso3: String,
    name_dupe: DupeValidator,
    iso2_dupe: DupeValidator,
    iso3_dupe: DupeValidator,
    error: Option<String>,
}

impl CountryForm {
    /// Empty form for a new country
    pub fn create() -> Self {
        Self {
            id: None,
            title: "Create a new Country".to_string(),
            name: String::new(),
            iso2: String::new(),
            iso3: String::new(),
            name_dupe: DupeValidator::new(),
            iso2_dupe: DupeValidator::new(),
            iso3_dupe: DupeValidator::new(),
            error: None,
        }
    }

    /// Form editing country `id`
    pub async fn load<A>(api: &A, id: i32) -> Result<Self>
    where
        A: Api<Country> + ?Sized,
    {
        let country = api.get(id).await?;

        let mut form = Self::create();
        form.id = Some(country.id);
        form.title = format!("Edit - {}", country.name);
        form.name = country.name;
        form.iso2 = country.iso2;
        form.iso3 = country.iso3;
        Ok(form)
    }

    /// Id of the country being edited; `None` when creating
    pub fn id(&self) -> Option<i32> {
        self.id
    }

    /// View title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Name control
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ISO 3166-1 alpha-2 control
    pub fn iso2(&self) -> &str {
        &self.iso2
    }

    /// ISO 3166-1 alpha-3 control
    pub fn iso3(&self) -> &str {
        &self.iso3
    }

    /// Duplicate check state of `field` (`name`, `iso2` or `iso3`)
    pub fn dupe_state(&self, field: &str) -> Option<&ValidationState> {
        match field {
            "name" => Some(self.name_dupe.state()),
            "iso2" => Some(self.iso2_dupe.state()),
            "iso3" => Some(self.iso3_dupe.state()),
            _ => None,
        }
    }

    /// Last submit error
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Edit the name
    pub fn set_name(&mut self, value: impl Into<String>) {
        self.name = value.into();
        self.name_dupe.reset();
    }

    /// Edit the two-letter code
    pub fn set_iso2(&mut self, value: impl Into<String>) {
        self.iso2 = value.into();
        self.iso2_dupe.reset();
    }

    /// Edit the three-letter code
    pub fn set_iso3(&mut self, value: impl Into<String>) {
        self.iso3 = value.into();
        self.iso3_dupe.reset();
    }

    /// Broken field rules
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_required("name", &self.name, &mut errors);
        check_pattern("iso2", &self.iso2, &ISO2, &mut errors);
        check_pattern("iso3", &self.iso3, &ISO3, &mut errors);
        errors
    }

    fn to_country(&self) -> Country {
        Country::new(self.name.trim(), self.iso2.trim(), self.iso3.trim())
            .with_id(self.id.unwrap_or(0))
    }

    /// Run the per-field duplicate checks of every field whose rules hold
    pub async fn check_dupes<A>(&mut self, api: &A)
    where
        A: Api<Country> + ?Sized,
    {
        let errors = self.field_errors();
        let passes = |field: &str| errors.iter().all(|e| e.field() != field);
        let id = self.id.unwrap_or(0);

        if passes("name") {
            let value = self.name.trim();
            self.name_dupe
                .check_value(value, api.is_dupe_field(id, "name", value))
                .await;
        } else {
            self.name_dupe.reset();
        }

        if passes("iso2") {
            let value = self.iso2.trim();
            self.iso2_dupe
                .check_value(value, api.is_dupe_field(id, "iso2", value))
                .await;
        } else {
            self.iso2_dupe.reset();
        }

        if passes("iso3") {
            let value = self.iso3.trim();
            self.iso3_dupe
                .check_value(value, api.is_dupe_field(id, "iso3", value))
                .await;
        } else {
            self.iso3_dupe.reset();
        }
    }

    fn validators(&self) -> [&DupeValidator; 3] {
        [&self.name_dupe, &self.iso2_dupe, &self.iso3_dupe]
    }

    /// Create or update the country
    pub async fn submit<A>(&mut self, api: &A) -> SubmitOutcome<Country>
    where
        A: Api<Country> + ?Sized,
    {
        let errors = self.field_errors();
        if !errors.is_empty() {
            return SubmitOutcome::Invalid(errors);
        }

        if self
            .validators()
            .iter()
            .any(|v| *v.state() == ValidationState::Idle)
        {
            self.check_dupes(api).await;
        }
        if let Some(blocking) = self
            .validators()
            .iter()
            .map(|v| v.state())
            .find(|state| state.blocks_submit())
        {
            return SubmitOutcome::Blocked(blocking.clone());
        }

        let country = self.to_country();
        let saved = match self.id {
            Some(_) => api.update(&country).await.map(|()| country),
            None => api.create(&country).await,
        };
        settle(&mut self.error, saved)
    }
}

fn settle<E>(error: &mut Option<String>, saved: Result<E>) -> SubmitOutcome<E> {
    match saved {
        Ok(record) => {
            *error = None;
            SubmitOutcome::Submitted(record)
        }
        Err(e) => {
            let message = e.to_string();
            *error = Some(message.clone());
            SubmitOutcome::Rejected(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LocalApi;

    #[test]
    fn test_coordinate_pattern() {
        for ok in ["45", "-45", "45.1", "-122.4194", "0.0001"] {
            assert!(COORDINATE.is_match(ok), "{ok}");
        }
        for bad in ["45.12345", "+45", "45.", ".5", "north", "4 5"] {
            assert!(!COORDINATE.is_match(bad), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_create_city_form() {
        let api = LocalApi::seeded();
        let form = CityForm::create(&api).await.unwrap();

        assert_eq!(form.title(), "Create a new City");
        assert_eq!(form.id(), None);
        let picker: Vec<&str> = form.countries().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(picker, vec!["Otherland", "Testland"]);
        assert_eq!(
            form.field_errors(),
            vec![
                FieldError::Required("name"),
                FieldError::Required("lat"),
                FieldError::Required("lon"),
                FieldError::Required("countryId"),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_city_form() {
        let api = LocalApi::seeded();
        let form = CityForm::load(&api, 2).await.unwrap();

        assert_eq!(form.title(), "Edit - TestCity2");
        assert_eq!(form.name(), "TestCity2");
        assert_eq!(form.lat(), "2");
        assert_eq!(form.country_id(), Some(1));
        assert!(form.field_errors().is_empty());
    }

    #[tokio::test]
    async fn test_records_carry_form_id() {
        let api = LocalApi::seeded();

        let edited = CityForm::load(&api, 2).await.unwrap();
        assert_eq!(edited.to_city().map(|c| c.id), Some(2));

        let mut fresh = CityForm::create(&api).await.unwrap();
        fresh.set_name("Nowhere");
        fresh.set_lat("-1.25");
        fresh.set_lon("3");
        fresh.set_country_id(2);
        assert_eq!(
            fresh.to_city(),
            Some(City::new("Nowhere", -1.25, 3.0, 2).with_id(0))
        );

        let country = CountryForm::load(&api, 2).await.unwrap().to_country();
        assert_eq!(country, Country::new("Otherland", "OL", "OLD").with_id(2));
        assert_eq!(CountryForm::create().to_country().id, 0);
    }

    #[tokio::test]
    async fn test_city_field_rules() {
        let api = LocalApi::seeded();
        let mut form = CityForm::load(&api, 1).await.unwrap();

        form.set_lat("45.12345");
        form.set_lon("east");
        form.set_name(" ");

        assert_eq!(
            form.field_errors(),
            vec![
                FieldError::Required("name"),
                FieldError::Pattern("lat"),
                FieldError::Pattern("lon"),
            ]
        );
        assert!(matches!(
            form.submit(&api).await,
            SubmitOutcome::Invalid(errors) if errors.len() == 3
        ));
        assert_eq!(api.dupe_checks(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_city_blocks_submit() {
        let api = LocalApi::seeded();
        let mut form = CityForm::create(&api).await.unwrap();
        form.set_name("testcity1");
        form.set_lat("1");
        form.set_lon("1");
        form.set_country_id(1);

        assert_eq!(
            form.submit(&api).await,
            SubmitOutcome::Blocked(ValidationState::Invalid)
        );

        form.set_lat("1.5");
        assert_eq!(form.dupe_state(), &ValidationState::Idle);

        let SubmitOutcome::Submitted(city) = form.submit(&api).await else {
            panic!("unique city must be stored");
        };
        assert_eq!(city.id, 4);
        assert_eq!(city.lat, 1.5);
    }

    #[tokio::test]
    async fn test_edit_city_keeps_own_values() {
        let api = LocalApi::seeded();
        let mut form = CityForm::load(&api, 3).await.unwrap();

        assert_eq!(form.check_dupe(&api).await, &ValidationState::Valid);

        form.set_country_id(2);
        assert!(matches!(form.submit(&api).await, SubmitOutcome::Submitted(_)));

        let stored = Api::<City>::get(&api, 3).await.unwrap();
        assert_eq!(stored.country_id, 2);
    }

    #[tokio::test]
    async fn test_failed_dupe_check_blocks_submit() {
        let api = LocalApi::seeded();
        let mut form = CityForm::load(&api, 3).await.unwrap();

        api.fail_requests(true);
        assert!(matches!(
            form.submit(&api).await,
            SubmitOutcome::Blocked(ValidationState::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_submit_keeps_form_open() {
        let api = LocalApi::seeded();
        let mut form = CityForm::load(&api, 3).await.unwrap();
        form.set_name("Renamed");
        form.check_dupe(&api).await;

        api.fail_requests(true);
        let outcome = form.submit(&api).await;

        assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
        assert!(form.error().unwrap().contains("503"));
        assert_eq!(form.name(), "Renamed");
    }

    #[tokio::test]
    async fn test_country_field_rules() {
        let mut form = CountryForm::create();
        form.set_name("Newland");
        form.set_iso2("N1");
        form.set_iso3("NEWL");

        assert_eq!(
            form.field_errors(),
            vec![FieldError::Pattern("iso2"), FieldError::Pattern("iso3")]
        );
        assert_eq!(form.title(), "Create a new Country");
    }

    #[tokio::test]
    async fn test_country_dupe_checks_per_field() {
        let api = LocalApi::seeded();
        let mut form = CountryForm::create();
        form.set_name("Newland");
        form.set_iso2("tl");
        form.set_iso3("NL");

        form.check_dupes(&api).await;

        assert_eq!(form.dupe_state("name"), Some(&ValidationState::Valid));
        assert_eq!(form.dupe_state("iso2"), Some(&ValidationState::Invalid));
        assert_eq!(form.dupe_state("iso3"), Some(&ValidationState::Idle));
        assert_eq!(api.dupe_checks(), 2);

        assert_eq!(
            form.submit(&api).await,
            SubmitOutcome::Invalid(vec![FieldError::Pattern("iso3")])
        );

        form.set_iso3("NWL");
        assert_eq!(
            form.submit(&api).await,
            SubmitOutcome::Blocked(ValidationState::Invalid)
        );

        form.set_iso2("NW");
        let SubmitOutcome::Submitted(country) = form.submit(&api).await else {
            panic!("unique country must be stored");
        };
        assert_eq!(country.id, 3);
    }

    #[tokio::test]
    async fn test_edit_country() {
        let api = LocalApi::seeded();
        let mut form = CountryForm::load(&api, 2).await.unwrap();
        assert_eq!(form.title(), "Edit - Otherland");

        form.set_name("Elsewhere");
        assert!(matches!(form.submit(&api).await, SubmitOutcome::Submitted(_)));

        let stored = Api::<Country>::get(&api, 2).await.unwrap();
        assert_eq!(stored.name, "Elsewhere");
        assert_eq!(stored.iso2, "OL");
    }
}
