use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use worldcities_cli::{
    edit_form::{CityForm, CountryForm, SubmitOutcome},
    list_view::{ListView, DEFAULT_FILTER_COLUMN, DEFAULT_SORT_COLUMN},
    Api, ApiClient,
};
use worldcities_server::{
    health::{HealthResponse, ReadinessResponse},
    models::{City, CityListing, Country, CountryListing, Entity},
    paging::{PageRequest, SortOrder, DEFAULT_PAGE_SIZE},
};

/// Paging, sorting and filtering options of a list command
#[derive(Args)]
pub struct ListArgs {
    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    page: i64,

    /// Rows per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    size: i64,

    /// Column to sort by
    #[arg(long, default_value = DEFAULT_SORT_COLUMN)]
    sort: String,

    /// Sort direction (asc or desc)
    #[arg(long, default_value = "asc")]
    order: SortOrder,

    /// Keep rows whose filter column contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Column the filter applies to
    #[arg(long, default_value = DEFAULT_FILTER_COLUMN)]
    filter_column: String,
}

impl ListArgs {
    fn request(&self) -> PageRequest {
        let request =
            PageRequest::new(self.page, self.size).with_sort(&self.sort, self.order);
        match self.filter.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => request.with_filter(&self.filter_column, query),
            _ => request,
        }
    }
}

/// Ask the server whether another record already holds a value
#[derive(Args)]
pub struct DupeArgs {
    /// Field to check
    #[arg(long)]
    field: String,

    /// Candidate value
    #[arg(long)]
    value: String,

    /// Record being edited (0 for a new record)
    #[arg(long, default_value_t = 0)]
    id: i32,
}

#[derive(Subcommand)]
pub enum CountryCommands {
    /// List countries with their number of cities
    List(ListArgs),
    /// Show one country
    Get {
        #[arg(value_name = "ID")]
        id: i32,
    },
    /// Create a country
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        iso2: String,
        #[arg(long)]
        iso3: String,
    },
    /// Change a country
    Edit {
        #[arg(value_name = "ID")]
        id: i32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        iso2: Option<String>,
        #[arg(long)]
        iso3: Option<String>,
    },
    /// Delete a country and its cities
    Delete {
        #[arg(value_name = "ID")]
        id: i32,
    },
    /// Check a single field for duplicates
    Dupe(DupeArgs),
}

#[derive(Subcommand)]
pub enum CityCommands {
    /// List cities with their country names
    List(ListArgs),
    /// Show one city
    Get {
        #[arg(value_name = "ID")]
        id: i32,
    },
    /// Create a city
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        #[arg(long, allow_hyphen_values = true)]
        lon: String,
        /// Owning country id
        #[arg(long)]
        country: i32,
    },
    /// Change a city
    Edit {
        #[arg(value_name = "ID")]
        id: i32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<String>,
        #[arg(long)]
        country: Option<i32>,
    },
    /// Delete a city
    Delete {
        #[arg(value_name = "ID")]
        id: i32,
    },
    /// Check a single field for duplicates
    Dupe(DupeArgs),
}

fn client(base_url: &str, token: Option<String>) -> Result<ApiClient> {
    let client = ApiClient::new(base_url).context("Failed to create HTTP client")?;
    Ok(match token {
        Some(token) => client.with_token(token),
        None => client,
    })
}

pub async fn countries(base_url: &str, token: Option<String>, command: CountryCommands) -> Result<()> {
    let api = client(base_url, token)?;

    match command {
        CountryCommands::List(args) => {
            let mut view = ListView::<Country>::new().with_request(args.request());
            view.refresh(&api).await.context("Failed to list countries")?;
            print_countries(&view);
        }
        CountryCommands::Get { id } => {
            let country = Api::<Country>::get(&api, id)
                .await
                .with_context(|| format!("Failed to load country {}", id))?;
            print_record(&country)?;
        }
        CountryCommands::Add { name, iso2, iso3 } => {
            let mut form = CountryForm::create();
            form.set_name(name);
            form.set_iso2(iso2);
            form.set_iso3(iso3);
            println!("{}", form.title().bold());
            report(form.submit(&api).await)?;
        }
        CountryCommands::Edit { id, name, iso2, iso3 } => {
            let mut form = CountryForm::load(&api, id)
                .await
                .with_context(|| format!("Failed to load country {}", id))?;
            println!("{}", form.title().bold());
            if let Some(name) = name {
                form.set_name(name);
            }
            if let Some(iso2) = iso2 {
                form.set_iso2(iso2);
            }
            if let Some(iso3) = iso3 {
                form.set_iso3(iso3);
            }
            report(form.submit(&api).await)?;
        }
        CountryCommands::Delete { id } => {
            Api::<Country>::delete(&api, id)
                .await
                .with_context(|| format!("Failed to delete country {}", id))?;
            println!("{} Deleted country {}", "✓".green().bold(), id);
        }
        CountryCommands::Dupe(args) => dupe::<Country>(&api, args).await?,
    }

    Ok(())
}

pub async fn cities(base_url: &str, token: Option<String>, command: CityCommands) -> Result<()> {
    let api = client(base_url, token)?;

    match command {
        CityCommands::List(args) => {
            let mut view = ListView::<City>::new().with_request(args.request());
            view.refresh(&api).await.context("Failed to list cities")?;
            print_cities(&view);
        }
        CityCommands::Get { id } => {
            let city = Api::<City>::get(&api, id)
                .await
                .with_context(|| format!("Failed to load city {}", id))?;
            print_record(&city)?;
        }
        CityCommands::Add { name, lat, lon, country } => {
            let mut form = CityForm::create(&api)
                .await
                .context("Failed to load the country list")?;
            form.set_name(name);
            form.set_lat(lat);
            form.set_lon(lon);
            form.set_country_id(country);
            println!("{}", form.title().bold());
            report(form.submit(&api).await)?;
        }
        CityCommands::Edit {
            id,
            name,
            lat,
            lon,
            country,
        } => {
            let mut form = CityForm::load(&api, id)
                .await
                .with_context(|| format!("Failed to load city {}", id))?;
            println!("{}", form.title().bold());
            if let Some(name) = name {
                form.set_name(name);
            }
            if let Some(lat) = lat {
                form.set_lat(lat);
            }
            if let Some(lon) = lon {
                form.set_lon(lon);
            }
            if let Some(country) = country {
                form.set_country_id(country);
            }
            report(form.submit(&api).await)?;
        }
        CityCommands::Delete { id } => {
            Api::<City>::delete(&api, id)
                .await
                .with_context(|| format!("Failed to delete city {}", id))?;
            println!("{} Deleted city {}", "✓".green().bold(), id);
        }
        CityCommands::Dupe(args) => dupe::<City>(&api, args).await?,
    }

    Ok(())
}

async fn dupe<E: Entity>(api: &ApiClient, args: DupeArgs) -> Result<()>
where
    ApiClient: Api<E>,
{
    let taken = Api::<E>::is_dupe_field(api, args.id, &args.field, &args.value)
        .await
        .context("Duplicate check failed")?;

    if taken {
        println!(
            "{} {} '{}' is already used by another {}",
            "✗".red().bold(),
            args.field,
            args.value,
            E::KIND
        );
    } else {
        println!("{} {} '{}' is free", "✓".green().bold(), args.field, args.value);
    }
    Ok(())
}

fn report<E: Entity>(outcome: SubmitOutcome<E>) -> Result<()> {
    match outcome {
        SubmitOutcome::Submitted(record) => {
            println!("{} Saved {} {}", "✓".green().bold(), E::KIND, record.id());
            print_record(&record)
        }
        SubmitOutcome::Invalid(errors) => {
            for error in &errors {
                println!("  {} {}", "✗".red(), error);
            }
            bail!("The {} form is not valid", E::KIND)
        }
        SubmitOutcome::Blocked(state) => {
            bail!("Duplicate check did not pass: {}", state)
        }
        SubmitOutcome::Rejected(message) => bail!("Save failed: {}", message),
    }
}

fn print_record<T: Serialize>(record: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to render record")?;
    println!("{}", json);
    Ok(())
}

fn print_pager<E: Entity>(view: &ListView<E>) {
    let pages = u64::try_from(view.page_size())
        .ok()
        .filter(|size| *size > 0)
        .map_or(0, |size| view.total_count().div_ceil(size));
    println!();
    println!(
        "Page {} of {} ({} {})",
        view.page_index() + 1,
        pages,
        view.total_count(),
        E::COLLECTION
    );
}

fn print_countries(view: &ListView<Country>) {
    println!(
        "{}",
        format!("{:>6}  {:<32} {:<4} {:<4} {:>6}", "ID", "NAME", "ISO2", "ISO3", "CITIES").bold()
    );
    for CountryListing {
        id,
        name,
        iso2,
        iso3,
        tot_cities,
    } in view.rows()
    {
        println!("{:>6}  {:<32} {:<4} {:<4} {:>6}", id, name, iso2, iso3, tot_cities);
    }
    print_pager(view);
}

fn print_cities(view: &ListView<City>) {
    println!(
        "{}",
        format!("{:>6}  {:<32} {:>10} {:>10}  {}", "ID", "NAME", "LAT", "LON", "COUNTRY").bold()
    );
    for CityListing {
        id,
        name,
        lat,
        lon,
        country_name,
        ..
    } in view.rows()
    {
        println!("{:>6}  {:<32} {:>10.4} {:>10.4}  {}", id, name, lat, lon, country_name);
    }
    print_pager(view);
}

pub async fn health(base_url: &str, verbose: bool) -> Result<()> {
    println!("{}", "Checking service health...".bold());
    println!();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to create HTTP client")?;
    let base_url = base_url.trim_end_matches('/');

    let url = format!("{}/health", base_url);
    print!("Health endpoint ({})... ", url);
    let health = fetch(&client, &url)
        .await
        .and_then(|(status, body)| parse_health(status, &body));
    match health {
        Ok(response) => {
            println!("{}", "✓ OK".green().bold());
            if verbose {
                println!("  Status: {}", response.status);
                if let Some(version) = response.version {
                    println!("  Version: {}", version);
                }
            }
        }
        Err(e) => return Err(failed(e)),
    }

    let url = format!("{}/ready", base_url);
    print!("Readiness endpoint ({})... ", url);
    let readiness = fetch(&client, &url)
        .await
        .and_then(|(status, body)| parse_readiness(status, &body));
    match readiness {
        Ok(response) => {
            println!("{}", "✓ OK".green().bold());
            if verbose {
                for (name, dependency) in &response.dependencies {
                    println!(
                        "  {}: {}",
                        name,
                        dependency.message.as_deref().unwrap_or("healthy")
                    );
                }
            }
        }
        Err(e) => return Err(failed(e)),
    }

    println!();
    println!("{}", "Service is healthy and ready!".green().bold());

    Ok(())
}

fn failed(e: anyhow::Error) -> anyhow::Error {
    println!("{}", "✗ FAILED".red().bold());
    println!("  Error: {}", e);
    e
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<(StatusCode, Vec<u8>)> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send request")?;

    let status = response.status();
    let body = response.bytes().await.context("Failed to read response")?;
    Ok((status, body.to_vec()))
}

fn parse_health(status: StatusCode, body: &[u8]) -> Result<HealthResponse> {
    if !status.is_success() {
        bail!("Endpoint returned status {}", status);
    }
    serde_json::from_slice(body).context("Failed to parse response")
}

/// A `/ready` answer; a 503 still carries the dependency report
fn parse_readiness(status: StatusCode, body: &[u8]) -> Result<ReadinessResponse> {
    let response: ReadinessResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(_) if !status.is_success() => bail!("Endpoint returned status {}", status),
        Err(e) => return Err(e).context("Failed to parse response"),
    };

    if !response.ready {
        let mut down: Vec<&str> = response
            .dependencies
            .iter()
            .filter(|(_, dependency)| !dependency.healthy)
            .map(|(name, _)| name.as_str())
            .collect();
        down.sort_unstable();
        bail!("Service is not ready (unhealthy: {})", down.join(", "));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use worldcities_server::health::DependencyStatus;

    #[test]
    fn test_readiness_body_parses() {
        let body = json!({
            "ready": true,
            "service": "worldcities",
            "dependencies": {"store": {"healthy": true, "message": "In memory"}}
        });

        let response =
            parse_readiness(StatusCode::OK, &serde_json::to_vec(&body).unwrap()).unwrap();
        assert!(response.ready);
        assert_eq!(response.service, "worldcities");
        assert!(response.dependencies["store"].healthy);
    }

    #[test]
    fn test_unready_service_names_failing_dependencies() {
        let report = ReadinessResponse {
            ready: false,
            service: "worldcities".to_string(),
            dependencies: HashMap::from([(
                "store".to_string(),
                DependencyStatus {
                    healthy: false,
                    message: Some("Connection failed".to_string()),
                },
            )]),
        };
        let body = serde_json::to_vec(&report).unwrap();

        let err = parse_readiness(StatusCode::SERVICE_UNAVAILABLE, &body).unwrap_err();
        assert!(err.to_string().contains("store"));

        let err = parse_readiness(StatusCode::BAD_GATEWAY, b"<html>").unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_health_body_parses() {
        let report = HealthResponse {
            status: "healthy".to_string(),
            service: "worldcities".to_string(),
            version: Some("0.1.0".to_string()),
        };
        let body = serde_json::to_vec(&report).unwrap();

        let response = parse_health(StatusCode::OK, &body).unwrap();
        assert_eq!(response.status, "healthy");
        assert!(parse_health(StatusCode::INTERNAL_SERVER_ERROR, &body).is_err());
    }

    #[test]
    fn test_list_args_request() {
        let args = ListArgs {
            page: 2,
            size: 5,
            sort: "totCities".to_string(),
            order: SortOrder::Desc,
            filter: Some("  ".to_string()),
            filter_column: DEFAULT_FILTER_COLUMN.to_string(),
        };
        let request = args.request();
        assert_eq!(request.sort_column.as_deref(), Some("totCities"));
        assert_eq!(request.sort_order.as_deref(), Some("desc"));
        assert_eq!(request.filter_query, None);

        let args = ListArgs {
            filter: Some("ber".to_string()),
            ..args
        };
        assert_eq!(args.request().filter_query.as_deref(), Some("ber"));
    }
}
