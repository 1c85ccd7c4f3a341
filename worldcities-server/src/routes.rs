//! HTTP routes
//!
//! Every entity gets the same surface under `/api/{collection}`:
//!
//! | method | path | role |
//! |---|---|---|
//! | `GET` | `/api/{collection}` | |
//! | `POST` | `/api/{collection}` | `RegisteredUser` |
//! | `GET` | `/api/{collection}/{id}` | |
//! | `PUT` | `/api/{collection}/{id}` | `RegisteredUser` |
//! | `DELETE` | `/api/{collection}/{id}` | `Administrator` |
//! | `POST` | `/api/{collection}/IsDupeField` | |
//!
//! plus `POST /api/cities/IsDupeCity`, `/health` and `/ready`.

use axum::{
    extract::{FromRef, Path, Query, State},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    controllers::ResourceController,
    error::Result,
    health::{health, readiness},
    middleware::{require_roles, JwtAuth, Role, RoleGuard},
    models::{City, Country, Entity},
    paging::{PageRequest, PageResult},
    responses::{Created, NoContent},
    state::AppState,
};

const EDITORS: RoleGuard = RoleGuard::new(&[Role::RegisteredUser]);
const ADMINISTRATORS: RoleGuard = RoleGuard::new(&[Role::Administrator]);

/// Query string of `IsDupeField`
///
/// The record id may be spelled `id`, `countryId` or `cityId`; absent means a
/// record that has not been stored yet.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DupeFieldQuery {
    /// Id of the record being edited
    #[serde(default, alias = "countryId", alias = "cityId")]
    pub id: i32,
    /// Field to check
    #[serde(default)]
    pub field_name: String,
    /// Candidate value
    #[serde(default)]
    pub field_value: String,
}

/// The complete application router
///
/// Bearer tokens are decoded for every route when `state` carries a JWT
/// validator; without one every guarded route answers 401.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .merge(resource_router::<Country>())
        .merge(resource_router::<City>())
        .route(
            &format!("/api/{}/IsDupeCity", City::COLLECTION),
            post(is_dupe_city),
        );

    if let Some(auth) = state.jwt().cloned() {
        app = app.layer(from_fn_with_state(auth, JwtAuth::middleware));
    }

    app.with_state(state)
}

/// CRUD, listing and `IsDupeField` routes of entity `E`
pub fn resource_router<E>() -> Router<AppState>
where
    E: Entity,
    ResourceController<E>: FromRef<AppState>,
{
    let collection = format!("/api/{}", E::COLLECTION);
    let item = format!("{}/{{id}}", collection);
    let dupe = format!("{}/IsDupeField", collection);

    Router::new()
        .route(
            &collection,
            get(list::<E>)
                .merge(post(create::<E>).route_layer(from_fn_with_state(EDITORS, require_roles))),
        )
        .route(
            &item,
            get(read::<E>)
                .merge(put(update::<E>).route_layer(from_fn_with_state(EDITORS, require_roles)))
                .merge(
                    delete(remove::<E>)
                        .route_layer(from_fn_with_state(ADMINISTRATORS, require_roles)),
                ),
        )
        .route(&dupe, post(is_dupe_field::<E>))
}

async fn list<E: Entity>(
    State(controller): State<ResourceController<E>>,
    Query(request): Query<PageRequest>,
) -> Result<Json<PageResult<E::Listing>>> {
    Ok(Json(controller.list(&request).await?))
}

async fn read<E: Entity>(
    State(controller): State<ResourceController<E>>,
    Path(id): Path<i32>,
) -> Result<Json<E>> {
    Ok(Json(controller.get(id).await?))
}

async fn create<E: Entity>(
    State(controller): State<ResourceController<E>>,
    Json(entity): Json<E>,
) -> Result<Created<E>> {
    let created = controller.create(entity).await?;
    let location = format!("/api/{}/{}", E::COLLECTION, created.id());
    Ok(Created::new(created).with_location(location))
}

async fn update<E: Entity>(
    State(controller): State<ResourceController<E>>,
    Path(id): Path<i32>,
    Json(entity): Json<E>,
) -> Result<NoContent> {
    controller.update(id, entity).await?;
    Ok(NoContent)
}

async fn remove<E: Entity>(
    State(controller): State<ResourceController<E>>,
    Path(id): Path<i32>,
) -> Result<NoContent> {
    controller.delete(id).await?;
    Ok(NoContent)
}

async fn is_dupe_field<E: Entity>(
    State(controller): State<ResourceController<E>>,
    Query(query): Query<DupeFieldQuery>,
) -> Result<Json<bool>> {
    let dupe = controller
        .is_dupe_field(query.id, &query.field_name, &query.field_value)
        .await?;
    Ok(Json(dupe))
}

async fn is_dupe_city(
    State(controller): State<ResourceController<City>>,
    Json(city): Json<City>,
) -> Result<Json<bool>> {
    Ok(Json(controller.is_dupe(&city).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CityListing;
    use crate::store::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use jsonwebtoken::{encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::middleware::Claims;

    const SECRET: &[u8] = b"worldcities-routes-secret";

    fn token(roles: &[&str]) -> String {
        let claims = Claims {
            sub: "user:1".to_string(),
            username: Some("tester".to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: get_current_timestamp() + 600,
            iat: Some(get_current_timestamp()),
            iss: None,
            aud: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_records(
            vec![
                Country::new("Testland", "TL", "TLD").with_id(1),
                Country::new("Otherland", "OL", "OLD").with_id(2),
            ],
            vec![
                City::new("TestCity2", 2.0, 2.0, 1).with_id(2),
                City::new("TestCity1", 1.0, 1.0, 1).with_id(1),
                City::new("TestCity3", 3.0, 3.0, 1).with_id(3),
            ],
        ))
    }

    async fn app() -> Router {
        let state = AppState::builder()
            .memory_store(seeded())
            .jwt(JwtAuth::with_key(
                DecodingKey::from_secret(SECRET),
                Algorithm::HS256,
                None,
                None,
            ))
            .build()
            .await
            .unwrap();
        router(state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_list_cities_sorted_by_name() {
        let app = app().await;

        let response = send(
            &app,
            Method::GET,
            "/api/cities?pageIndex=0&pageSize=10&sortColumn=name&sortOrder=asc",
            None,
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let page: serde_json::Value = json(response).await;
        let names: Vec<&str> = page["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["TestCity1", "TestCity2", "TestCity3"]);
        assert_eq!(page["totalCount"], 3);
        assert_eq!(page["data"][0]["countryName"], "Testland");
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_column() {
        let app = app().await;

        let response = send(&app, Method::GET, "/api/cities?sortColumn=population", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_countries_with_city_counts() {
        let app = app().await;

        let response = send(
            &app,
            Method::GET,
            "/api/countries?filterColumn=name&filterQuery=test",
            None,
            None,
        )
        .await;
        let page: serde_json::Value = json(response).await;
        assert_eq!(page["totalCount"], 1);
        assert_eq!(page["data"][0]["totCities"], 3);
    }

    #[tokio::test]
    async fn test_create_requires_registered_user() {
        let app = app().await;
        let city = serde_json::json!({"name": "TestCity4", "lat": 4.0, "lon": 4.0, "countryId": 1});

        let anonymous = send(&app, Method::POST, "/api/cities", None, Some(city.clone())).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let forged = send(&app, Method::POST, "/api/cities", Some("not-a-jwt"), Some(city.clone())).await;
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

        let no_role = send(&app, Method::POST, "/api/cities", Some(&token(&[])), Some(city.clone())).await;
        assert_eq!(no_role.status(), StatusCode::FORBIDDEN);

        let created = send(
            &app,
            Method::POST,
            "/api/cities",
            Some(&token(&["RegisteredUser"])),
            Some(city),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(
            created.headers().get(header::LOCATION).unwrap(),
            "/api/cities/4"
        );
        let city: City = json(created).await;
        assert_eq!(city.id, 4);
    }

    #[tokio::test]
    async fn test_delete_requires_administrator() {
        let app = app().await;

        let user = send(
            &app,
            Method::DELETE,
            "/api/cities/1",
            Some(&token(&["RegisteredUser"])),
            None,
        )
        .await;
        assert_eq!(user.status(), StatusCode::FORBIDDEN);

        let admin = token(&["Administrator"]);
        let deleted = send(&app, Method::DELETE, "/api/cities/1", Some(&admin), None).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let missing = send(&app, Method::DELETE, "/api/cities/999", Some(&admin), None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let gone = send(&app, Method::GET, "/api/cities/1", None, None).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_checks_ids() {
        let app = app().await;
        let editor = token(&["RegisteredUser"]);

        let mismatched = send(
            &app,
            Method::PUT,
            "/api/cities/5",
            Some(&editor),
            Some(serde_json::json!({"id": 7, "name": "X", "lat": 0.0, "lon": 0.0, "countryId": 1})),
        )
        .await;
        assert_eq!(mismatched.status(), StatusCode::BAD_REQUEST);

        let missing = send(
            &app,
            Method::PUT,
            "/api/cities/42",
            Some(&editor),
            Some(serde_json::json!({"id": 42, "name": "X", "lat": 0.0, "lon": 0.0, "countryId": 1})),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let updated = send(
            &app,
            Method::PUT,
            "/api/cities/2",
            Some(&editor),
            Some(serde_json::json!({"id": 2, "name": "Renamed", "lat": 2.0, "lon": 2.0, "countryId": 2})),
        )
        .await;
        assert_eq!(updated.status(), StatusCode::NO_CONTENT);

        let city: City = json(send(&app, Method::GET, "/api/cities/2", None, None).await).await;
        assert_eq!(city.name, "Renamed");
        assert_eq!(city.country_id, 2);
    }

    #[tokio::test]
    async fn test_unguarded_routes_ignore_bad_tokens() {
        let app = app().await;

        let response = send(&app, Method::GET, "/api/countries/1", Some("garbage"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let country: Country = json(response).await;
        assert_eq!(country.iso3, "TLD");
    }

    #[tokio::test]
    async fn test_is_dupe_field() {
        let app = app().await;

        let dupe: bool = json(
            send(
                &app,
                Method::POST,
                "/api/countries/IsDupeField?countryId=0&fieldName=iso2&fieldValue=tl",
                None,
                None,
            )
            .await,
        )
        .await;
        assert!(dupe);

        let own: bool = json(
            send(
                &app,
                Method::POST,
                "/api/countries/IsDupeField?countryId=1&fieldName=iso2&fieldValue=TL",
                None,
                None,
            )
            .await,
        )
        .await;
        assert!(!own);

        let unknown: bool = json(
            send(
                &app,
                Method::POST,
                "/api/cities/IsDupeField?cityId=0&fieldName=population&fieldValue=1",
                None,
                None,
            )
            .await,
        )
        .await;
        assert!(!unknown);
    }

    #[tokio::test]
    async fn test_is_dupe_city() {
        let app = app().await;

        let twin = serde_json::json!({"id": 0, "name": "testcity3", "lat": 3.0, "lon": 3.0, "countryId": 1});
        let dupe: bool = json(send(&app, Method::POST, "/api/cities/IsDupeCity", None, Some(twin)).await).await;
        assert!(dupe);

        let itself = serde_json::json!({"id": 3, "name": "TestCity3", "lat": 3.0, "lon": 3.0, "countryId": 1});
        let dupe: bool = json(send(&app, Method::POST, "/api/cities/IsDupeCity", None, Some(itself)).await).await;
        assert!(!dupe);
    }

    #[tokio::test]
    async fn test_guarded_routes_without_jwt_config() {
        let state = AppState::builder().memory_store(seeded()).build().await.unwrap();
        let app = router(state);

        let response = send(
            &app,
            Method::DELETE,
            "/api/countries/1",
            Some(&token(&["Administrator"])),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let listing: PageResult<CityListing> =
            json(send(&app, Method::GET, "/api/cities?pageSize=2", None, None).await).await;
        assert_eq!(listing.data.len(), 2);
        assert_eq!(listing.total_pages, 2);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = app().await;

        assert_eq!(
            send(&app, Method::GET, "/health", None, None).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            send(&app, Method::GET, "/ready", None, None).await.status(),
            StatusCode::OK
        );
    }
}
