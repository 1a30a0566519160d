//! # Vehicle REST API
//!
//! Thin transport adapter over [`VehicleRegistry`]: decodes and validates
//! bodies, calls the registry, and turns outcomes into status codes, alert
//! headers and error bodies.
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | POST | `/api/vehicles` | 201 + `Location` |
//! | PUT | `/api/vehicles` | 200 (201 when the body has no id) |
//! | GET | `/api/vehicles` | 200 |
//! | GET | `/api/vehicles/{id}` | 200 |
//! | DELETE | `/api/vehicles/{id}` | 200 |
//! | GET | `/api/occupancy` | 200 |
//! | GET | `/management/health` | 200 |

use crate::config::Config;
use crate::error::Result;
use crate::middleware::{CorsMiddleware, LoggingMiddleware, TimingMiddleware};
use crate::registry::{AdmissionError, VehicleRegistry};
use crate::request::ApiRequest;
use crate::response::ApiResponse;
use crate::router::Method;
use crate::server::{handler, Server};
use crate::types::{convert_param, ParamType};
use crate::validation::{Validate, ValidationErrors};
use crate::vehicle::{VehicleId, VehicleRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Entity name used in alert headers and error bodies
pub const ENTITY_NAME: &str = "vehicle";

const VEHICLES_PATH: &str = "/api/vehicles";

/// Builds `X-<app>-*` alert headers
#[derive(Debug, Clone)]
pub struct Alerts {
    app_name: String,
}

impl Alerts {
    /// Alerts for the given application name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    fn alert_header(&self) -> String {
        format!("X-{}-alert", self.app_name)
    }

    fn params_header(&self) -> String {
        format!("X-{}-params", self.app_name)
    }

    fn error_header(&self) -> String {
        format!("X-{}-error", self.app_name)
    }

    /// Every header name this instance may set
    #[must_use]
    pub fn header_names(&self) -> [String; 3] {
        [self.alert_header(), self.error_header(), self.params_header()]
    }

    /// Tag a successful response with `<app>.vehicle.<action>`
    #[must_use]
    pub fn entity(&self, response: ApiResponse, action: &str, param: &str) -> ApiResponse {
        let alert = format!("{}.{}.{}", self.app_name, ENTITY_NAME, action);
        response
            .with_header(&self.alert_header(), &alert)
            .with_header(&self.params_header(), param)
    }

    /// Tag a failed response with `error.<key>`
    #[must_use]
    pub fn failure(&self, response: ApiResponse, key: &str) -> ApiResponse {
        response
            .with_header(&self.error_header(), &format!("error.{key}"))
            .with_header(&self.params_header(), ENTITY_NAME)
    }
}

/// Client-facing error body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Problem<'a> {
    entity_name: &'static str,
    error_key: &'a str,
    title: String,
    message: String,
    status: u16,
    #[serde(flatten)]
    field_errors: Option<&'a ValidationErrors>,
}

/// Shared state of the vehicle handlers
#[derive(Debug, Clone)]
struct VehicleApi {
    registry: Arc<VehicleRegistry>,
    alerts: Alerts,
}

impl VehicleApi {
    fn problem(
        &self,
        status: u16,
        key: &str,
        title: String,
        fields: Option<&ValidationErrors>,
    ) -> ApiResponse {
        let body = Problem {
            entity_name: ENTITY_NAME,
            error_key: key,
            title,
            message: format!("error.{key}"),
            status,
            field_errors: fields,
        };
        self.alerts.failure(ApiResponse::json(status, &body), key)
    }

    fn admission_failure(&self, err: &AdmissionError) -> ApiResponse {
        let status = match err {
            AdmissionError::NotFound(_) => 404,
            AdmissionError::Store(e) => {
                error!("Registry store failure: {}", e);
                500
            }
            _ => 400,
        };
        let title = if err.is_client_error() {
            err.to_string()
        } else {
            "Internal Server Error".to_string()
        };
        self.problem(status, err.key(), title, None)
    }

    /// Decode and validate a vehicle body
    fn vehicle_body(&self, req: &ApiRequest) -> std::result::Result<VehicleRecord, ApiResponse> {
        let mut record: VehicleRecord = req.json().map_err(|e| {
            debug!("Rejected vehicle body: {}", e);
            self.problem(400, "badrequest", e.to_string(), None)
        })?;
        // Stored plates are trimmed so padding cannot dodge the duplicate check.
        record.plate = record.plate.trim().to_string();
        record.validate().map_err(|errors| {
            self.problem(
                400,
                "validation",
                "Method argument not valid".to_string(),
                Some(&errors),
            )
        })?;
        Ok(record)
    }

    /// The `{id}` path segment as a vehicle id
    fn path_id(&self, req: &ApiRequest) -> std::result::Result<VehicleId, ApiResponse> {
        let raw = req.param("id").unwrap_or_default();
        match convert_param(raw, ParamType::Int) {
            Ok(value) => value
                .as_int()
                .ok_or_else(|| self.problem(400, "badrequest", "Bad Request".to_string(), None)),
            Err(e) => Err(self.problem(400, "badrequest", e.to_string(), None)),
        }
    }

    fn created(&self, record: &VehicleRecord) -> ApiResponse {
        let id = record.id.map(|id| id.to_string()).unwrap_or_default();
        let response = ApiResponse::json(201, record)
            .with_header("Location", &format!("{VEHICLES_PATH}/{id}"));
        self.alerts.entity(response, "created", &id)
    }

    async fn create(self, req: ApiRequest) -> ApiResponse {
        let candidate = match self.vehicle_body(&req) {
            Ok(record) => record,
            Err(resp) => return resp,
        };
        match self.registry.register(candidate).await {
            Ok(stored) => self.created(&stored),
            Err(e) => self.admission_failure(&e),
        }
    }

    async fn update(self, req: ApiRequest) -> ApiResponse {
        let record = match self.vehicle_body(&req) {
            Ok(record) => record,
            Err(resp) => return resp,
        };
        let creating = record.id.is_none();
        match self.registry.update(record).await {
            Ok(stored) if creating => self.created(&stored),
            Ok(stored) => {
                let id = stored.id.map(|id| id.to_string()).unwrap_or_default();
                self.alerts
                    .entity(ApiResponse::json(200, &stored), "updated", &id)
            }
            Err(e) => self.admission_failure(&e),
        }
    }

    async fn list(self, _req: ApiRequest) -> ApiResponse {
        match self.registry.list().await {
            Ok(records) => ApiResponse::json(200, &records),
            Err(e) => self.admission_failure(&e),
        }
    }

    async fn get(self, req: ApiRequest) -> ApiResponse {
        let id = match self.path_id(&req) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        match self.registry.get(id).await {
            Ok(record) => ApiResponse::json(200, &record),
            Err(e) => self.admission_failure(&e),
        }
    }

    async fn delete(self, req: ApiRequest) -> ApiResponse {
        let id = match self.path_id(&req) {
            Ok(id) => id,
            Err(resp) => return resp,
        };
        match self.registry.delete(id).await {
            Ok(()) => self
                .alerts
                .entity(ApiResponse::empty(200), "deleted", &id.to_string()),
            Err(e) => self.admission_failure(&e),
        }
    }

    async fn occupancy(self, _req: ApiRequest) -> ApiResponse {
        match self.registry.occupancy().await {
            Ok(report) => ApiResponse::json(200, &report),
            Err(e) => self.admission_failure(&e),
        }
    }
}

/// Register the vehicle routes on `server`
///
/// `/api` routes require a bearer token when the server has auth enabled;
/// the health route never does.
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a route conflicts with one already
/// registered.
pub fn mount(server: &mut Server, registry: Arc<VehicleRegistry>, alerts: Alerts) -> Result<()> {
    let api = VehicleApi { registry, alerts };
    let auth = server.auth_enabled();

    macro_rules! route {
        ($method:expr, $path:expr, $action:ident) => {{
            let api = api.clone();
            server.add_route(
                $method,
                $path,
                handler(move |req| api.clone().$action(req)),
                auth,
            )?;
        }};
    }

    route!(Method::Post, VEHICLES_PATH, create);
    route!(Method::Put, VEHICLES_PATH, update);
    route!(Method::Get, VEHICLES_PATH, list);
    route!(Method::Get, "/api/vehicles/{id}", get);
    route!(Method::Delete, "/api/vehicles/{id}", delete);
    route!(Method::Get, "/api/occupancy", occupancy);

    server.add_route(
        Method::Get,
        "/management/health",
        handler(|_req| async { ApiResponse::json(200, &serde_json::json!({ "status": "UP" })) }),
        false,
    )?;
    Ok(())
}

/// Assemble a ready-to-serve application from configuration
///
/// Adds the logging, timing and CORS middleware, enables auth when a JWT
/// secret is configured, and mounts the vehicle routes.
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if route registration fails.
pub fn app(config: &Config, registry: Arc<VehicleRegistry>) -> Result<Server> {
    let mut server = Server::new(config.server.clone().into());
    if let Some(secret) = config.auth.jwt_secret.as_deref() {
        server.enable_auth(secret);
    }
    server.add_middleware(LoggingMiddleware);
    server.add_middleware(TimingMiddleware::new());

    let alerts = Alerts::new(config.alerts.app_name.clone());
    let exposed = ["Location".to_string(), "x-request-id".to_string()]
        .into_iter()
        .chain(alerts.header_names());
    server.add_middleware(
        CorsMiddleware::new()
            .allow_origin(config.cors.allow_origin.clone())
            .expose(exposed),
    );

    mount(&mut server, registry, alerts)?;
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapacityConfig;
    use crate::store::MemoryStore;
    use hyper::body::Bytes;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn test_app(config: &Config) -> Server {
        let registry = Arc::new(VehicleRegistry::new(
            Arc::new(MemoryStore::new()),
            config.capacity,
        ));
        app(config, registry).unwrap()
    }

    fn small_lot() -> Config {
        Config {
            capacity: CapacityConfig {
                car: Some(2),
                motorcycle: Some(1),
            },
            ..Config::default()
        }
    }

    async fn send(server: &Server, method: Method, path: &str, body: Option<Value>) -> ApiResponse {
        let body = body.map(|v| Bytes::from(v.to_string()));
        server.test_request(method, path, HashMap::new(), body).await
    }

    #[tokio::test]
    async fn test_create_returns_201_with_alerts() {
        let server = test_app(&small_lot());
        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "CAR", "owner": "Ana"})),
        )
        .await;

        assert_eq!(resp.status, 201);
        let body = resp.json_body().unwrap();
        assert_eq!(body["id"], 1);
        assert_eq!(body["owner"], "Ana");
        assert_eq!(resp.header("location"), Some("/api/vehicles/1"));
        assert_eq!(resp.header("x-parkingApp-alert"), Some("parkingApp.vehicle.created"));
        assert_eq!(resp.header("x-parkingApp-params"), Some("1"));
    }

    #[tokio::test]
    async fn test_create_with_id_rejected() {
        let server = test_app(&small_lot());
        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"id": 5, "plate": "AAA111", "type": "CAR"})),
        )
        .await;

        assert_eq!(resp.status, 400);
        let body = resp.json_body().unwrap();
        assert_eq!(body["errorKey"], "idexists");
        assert_eq!(body["message"], "error.idexists");
        assert_eq!(body["entityName"], "vehicle");
        assert_eq!(resp.header("x-parkingApp-error"), Some("error.idexists"));
        assert_eq!(resp.header("x-parkingApp-params"), Some("vehicle"));
    }

    #[tokio::test]
    async fn test_duplicate_and_capacity_errors() {
        let server = test_app(&small_lot());
        for plate in ["AAA111", "BBB222"] {
            let resp = send(
                &server,
                Method::Post,
                "/api/vehicles",
                Some(json!({"plate": plate, "type": "CAR"})),
            )
            .await;
            assert_eq!(resp.status, 201);
        }

        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "CCC333", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.status, 400);
        assert_eq!(resp.json_body().unwrap()["errorKey"], "carromax");

        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.json_body().unwrap()["errorKey"], "placaexist");

        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "MOTO"})),
        )
        .await;
        assert_eq!(resp.status, 201);
        assert_eq!(resp.json_body().unwrap()["type"], "MOTORCYCLE");

        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "DDD444", "type": "MOTORCYCLE"})),
        )
        .await;
        assert_eq!(resp.json_body().unwrap()["errorKey"], "motomax");
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let server = test_app(&small_lot());
        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "THIS-PLATE-IS-TOO-LONG", "type": "CAR"})),
        )
        .await;

        assert_eq!(resp.status, 400);
        let body = resp.json_body().unwrap();
        assert_eq!(body["errorKey"], "validation");
        assert_eq!(body["fieldErrors"][0]["field"], "plate");
        assert_eq!(body["fieldErrors"][0]["code"], "TOO_LONG");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = test_app(&small_lot());
        let resp = server
            .test_request(
                Method::Post,
                "/api/vehicles",
                HashMap::new(),
                Some(Bytes::from_static(b"{not json")),
            )
            .await;
        assert_eq!(resp.status, 400);
        assert_eq!(resp.json_body().unwrap()["errorKey"], "badrequest");

        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "TRUCK"})),
        )
        .await;
        assert_eq!(resp.status, 400);
    }

    #[tokio::test]
    async fn test_put_paths() {
        let server = test_app(&small_lot());

        let resp = send(
            &server,
            Method::Put,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.status, 201);
        assert_eq!(resp.header("x-parkingApp-alert"), Some("parkingApp.vehicle.created"));

        let resp = send(
            &server,
            Method::Put,
            "/api/vehicles",
            Some(json!({"id": 1, "plate": "AAA111", "type": "CAR", "owner": "Bo"})),
        )
        .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body().unwrap()["owner"], "Bo");
        assert_eq!(resp.header("x-parkingApp-alert"), Some("parkingApp.vehicle.updated"));
        assert_eq!(resp.header("x-parkingApp-params"), Some("1"));
    }

    #[tokio::test]
    async fn test_get_list_delete() {
        let server = test_app(&small_lot());
        send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "CAR"})),
        )
        .await;

        let resp = send(&server, Method::Get, "/api/vehicles/1", None).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body().unwrap()["plate"], "AAA111");

        let resp = send(&server, Method::Get, "/api/vehicles", None).await;
        assert_eq!(resp.json_body().unwrap().as_array().unwrap().len(), 1);

        let resp = send(&server, Method::Delete, "/api/vehicles/1", None).await;
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_empty());
        assert_eq!(resp.header("x-parkingApp-alert"), Some("parkingApp.vehicle.deleted"));

        let resp = send(&server, Method::Get, "/api/vehicles/1", None).await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.json_body().unwrap()["errorKey"], "notfound");

        let resp = send(&server, Method::Delete, "/api/vehicles/1", None).await;
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn test_put_with_largest_id() {
        let server = test_app(&small_lot());
        let resp = send(
            &server,
            Method::Put,
            "/api/vehicles",
            Some(json!({"id": i64::MAX, "plate": "AAA111", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body().unwrap()["id"], i64::MAX);

        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "BBB222", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.status, 500);
        assert_eq!(resp.json_body().unwrap()["errorKey"], "internal");
    }

    #[tokio::test]
    async fn test_non_integer_id_is_bad_request() {
        let server = test_app(&small_lot());
        for method in [Method::Get, Method::Delete] {
            let resp = send(&server, method, "/api/vehicles/abc", None).await;
            assert_eq!(resp.status, 400);
            let body = resp.json_body().unwrap();
            assert_eq!(body["errorKey"], "badrequest");
            assert_eq!(body["status"], 400);
            assert_eq!(resp.header("x-parkingApp-error"), Some("error.badrequest"));
        }

        let resp = send(&server, Method::Get, "/api/vehicles/99999999999999999999", None).await;
        assert_eq!(resp.status, 400);
    }

    #[tokio::test]
    async fn test_padded_plate_is_a_duplicate() {
        let server = test_app(&small_lot());
        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.status, 201);

        for padded in ["AAA111 ", " AAA111", "\tAAA111"] {
            let resp = send(
                &server,
                Method::Post,
                "/api/vehicles",
                Some(json!({"plate": padded, "type": "CAR"})),
            )
            .await;
            assert_eq!(resp.status, 400, "{padded:?}");
            assert_eq!(resp.json_body().unwrap()["errorKey"], "placaexist");
        }

        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": " BBB222 ", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.status, 201);
        assert_eq!(resp.json_body().unwrap()["plate"], "BBB222");
    }

    #[tokio::test]
    async fn test_preflight_reaches_cors_without_token() {
        let mut config = small_lot();
        config.auth.jwt_secret = Some("topsecret".to_string());
        let server = test_app(&config);

        let headers = HashMap::from([
            ("Origin".to_string(), "https://parking.example".to_string()),
            ("Access-Control-Request-Method".to_string(), "POST".to_string()),
        ]);
        let resp = server
            .test_request(Method::Options, "/api/vehicles", headers, None)
            .await;
        assert_eq!(resp.status, 204);
        assert_eq!(resp.header("allow"), Some("GET, POST, PUT, OPTIONS"));
        assert_eq!(
            resp.header("access-control-allow-methods"),
            Some("GET, POST, PUT, DELETE, OPTIONS")
        );
        assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
    }

    #[tokio::test]
    async fn test_occupancy_report() {
        let server = test_app(&small_lot());
        send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "CAR"})),
        )
        .await;

        let resp = send(&server, Method::Get, "/api/occupancy", None).await;
        assert_eq!(resp.status, 200);
        let body = resp.json_body().unwrap();
        assert_eq!(body[0]["type"], "CAR");
        assert_eq!(body[0]["count"], 1);
        assert_eq!(body[0]["capacity"], 2);
        assert_eq!(body[0]["available"], 1);
        assert_eq!(body[1]["type"], "MOTORCYCLE");
        assert_eq!(body[1]["available"], 1);
    }

    #[tokio::test]
    async fn test_health_and_cors() {
        let server = test_app(&Config::default());
        let resp = send(&server, Method::Get, "/management/health", None).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body().unwrap()["status"], "UP");
        assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
        let exposed = resp.header("access-control-expose-headers").unwrap();
        assert!(exposed.contains("X-parkingApp-alert"));
        assert!(exposed.contains("Location"));
    }

    #[tokio::test]
    async fn test_custom_app_name() {
        let mut config = small_lot();
        config.alerts.app_name = "lotA".to_string();
        let server = test_app(&config);
        let resp = send(
            &server,
            Method::Post,
            "/api/vehicles",
            Some(json!({"plate": "AAA111", "type": "CAR"})),
        )
        .await;
        assert_eq!(resp.header("x-lotA-alert"), Some("lotA.vehicle.created"));
    }

    #[tokio::test]
    async fn test_jwt_protects_api_not_health() {
        let mut config = small_lot();
        config.auth.jwt_secret = Some("topsecret".to_string());
        let server = test_app(&config);

        let resp = send(&server, Method::Get, "/api/vehicles", None).await;
        assert_eq!(resp.status, 401);

        let resp = send(&server, Method::Get, "/management/health", None).await;
        assert_eq!(resp.status, 200);

        let token = encode(
            &Header::default(),
            &json!({"sub": "gate-1", "exp": 4_102_444_800_u64}),
            &EncodingKey::from_secret(b"topsecret"),
        )
        .unwrap();
        let headers = HashMap::from([("Authorization".to_string(), format!("Bearer {token}"))]);
        let resp = server
            .test_request(Method::Get, "/api/vehicles", headers, None)
            .await;
        assert_eq!(resp.status, 200);
    }
}
