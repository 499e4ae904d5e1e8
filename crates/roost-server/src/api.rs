//! HTTP API
//!
//! Two surfaces share one router:
//! - `/svc/*` is called by nodes (iPXE, the microkernel, installers) and
//!   speaks plain text boot scripts and small JSON bodies
//! - `/api/*` is the administrative API and answers with Siren entities

use crate::provisioning::{BootError, BootService, CheckInResponse};
use crate::store::StoreError;
use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use roost_common::{Facts, Node};
use roost_ipxe::{bootstrap_script, BootScript, MAX_BOOTSTRAP_NICS};
use roost_policy::{Policy, PolicyError};
use roost_siren::{action, entity, link, Entity, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Media type of Siren documents
pub const SIREN_CONTENT_TYPE: &str = "application/vnd.siren+json";

/// NICs reported by the bootstrap script unless asked otherwise
const DEFAULT_BOOTSTRAP_NICS: u8 = 4;

/// Build the router
pub fn router(service: Arc<BootService>) -> Router {
    Router::new()
        // Node-facing
        .route("/svc/boot", get(boot))
        .route("/svc/checkin", post(checkin))
        .route("/svc/stage-done/{id}", get(stage_done).post(stage_done))
        // Administrative
        .route("/api", get(api_root))
        .route("/api/microkernel/bootstrap", get(bootstrap))
        .route("/api/nodes", get(list_nodes))
        .route("/api/nodes/{id}", get(get_node).delete(delete_node))
        .route("/api/nodes/{id}/reinstall", post(reinstall_node))
        .route("/api/nodes/{id}/metadata", post(update_node_metadata))
        .route("/api/policies", get(list_policies).post(create_policy))
        .route("/api/policies/{name}", get(get_policy).delete(delete_policy))
        .route("/api/policies/{name}/enable", post(enable_policy))
        .route("/api/policies/{name}/disable", post(disable_policy))
        .with_state(service)
}

// ============================================================================
// Responses
// ============================================================================

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<BootError> for ApiError {
    fn from(err: BootError) -> Self {
        let status = match &err {
            BootError::InvalidRequest(_) | BootError::UnknownTask(_) => StatusCode::BAD_REQUEST,
            BootError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            BootError::Store(StoreError::InvalidState { .. }) => StatusCode::CONFLICT,
            BootError::Store(StoreError::Lock(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            BootError::Policy(PolicyError::NotFound(_)) => StatusCode::NOT_FOUND,
            BootError::Policy(PolicyError::DuplicateName(_))
            | BootError::Policy(PolicyError::DuplicateLineNumber { .. }) => StatusCode::CONFLICT,
            BootError::Policy(_) => StatusCode::BAD_REQUEST,
            BootError::Script(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// A Siren document
pub struct Siren(pub Entity);

impl IntoResponse for Siren {
    fn into_response(self) -> Response {
        ([(CONTENT_TYPE, SIREN_CONTENT_TYPE)], Json(self.0)).into_response()
    }
}

fn script_response(script: BootScript) -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, script.content_type)], script.body).into_response()
}

// ============================================================================
// Siren representations
// ============================================================================

fn properties_of<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Node entity, classed by its install state
pub fn node_entity(base: &str, node: &Node) -> Entity {
    let href = format!("{}/api/nodes/{}", base, node.id);
    let mut properties = properties_of(node);
    properties.insert("name".to_string(), json!(node.name()));

    entity(
        ["node", node.install_state.as_str()],
        properties,
        [],
        [
            node.is_bound().then(|| {
                action("reinstall", "Reinstall", format!("{}/reinstall", href), "node")
                    .with_method(Method::Post)
            }),
            Some(
                action("set-metadata", "Set metadata", format!("{}/metadata", href), "node")
                    .with_method(Method::Post),
            ),
            Some(action("delete", "Delete node", href.clone(), "node").with_method(Method::Delete)),
        ],
        [
            Some(link("self", href.clone())),
            node.bound_policy()
                .map(|policy| link("policy", format!("{}/api/policies/{}", base, policy))),
        ],
    )
}

/// Policy entity; only the applicable toggle action is offered
pub fn policy_entity(base: &str, policy: &Policy, bound_count: usize) -> Entity {
    let href = format!("{}/api/policies/{}", base, policy.name);
    let mut properties = properties_of(policy);
    properties.insert("bound_count".to_string(), json!(bound_count));

    entity(
        "policy",
        properties,
        [],
        [
            (!policy.enabled).then(|| {
                action("enable", "Enable policy", format!("{}/enable", href), "policy")
                    .with_method(Method::Post)
            }),
            policy.enabled.then(|| {
                action("disable", "Disable policy", format!("{}/disable", href), "policy")
                    .with_method(Method::Post)
            }),
            Some(action("delete", "Delete policy", href.clone(), "policy").with_method(Method::Delete)),
        ],
        [Some(link("self", href))],
    )
}

// ============================================================================
// Node-facing handlers
// ============================================================================

/// `GET /svc/boot?net0=..&net1=..`
///
/// Every non-empty `mac` or `net*` parameter is a MAC address of the
/// calling machine. Missing NICs come through as empty values.
pub async fn boot(
    State(service): State<Arc<BootService>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let macs: Vec<String> = params
        .into_iter()
        .filter(|(key, value)| (key == "mac" || key.starts_with("net")) && !value.trim().is_empty())
        .map(|(_, value)| value)
        .collect();

    match service.boot(&macs).await {
        Ok(script) => script_response(script),
        Err(e) => {
            warn!("Boot request for {:?} failed: {}", macs, e);
            ApiError::from(e).into_response()
        }
    }
}

/// Check-in body sent by the microkernel
#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub macs: Vec<String>,
    #[serde(default)]
    pub facts: Facts,
}

/// `POST /svc/checkin`
pub async fn checkin(
    State(service): State<Arc<BootService>>,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<Json<CheckInResponse>> {
    let response = service.checkin(&request.macs, request.facts).await?;
    Ok(Json(response))
}

/// `GET|POST /svc/stage-done/{id}`
pub async fn stage_done(
    State(service): State<Arc<BootService>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Node>> {
    Ok(Json(service.stage_done(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct BootstrapQuery {
    /// Capped at [`MAX_BOOTSTRAP_NICS`]
    pub nic_max: Option<u32>,
}

/// `GET /api/microkernel/bootstrap?nic_max=N`
pub async fn bootstrap(
    State(service): State<Arc<BootService>>,
    Query(query): Query<BootstrapQuery>,
) -> Response {
    let nic_max = query
        .nic_max
        .map(|n| u8::try_from(n).unwrap_or(MAX_BOOTSTRAP_NICS).min(MAX_BOOTSTRAP_NICS))
        .unwrap_or(DEFAULT_BOOTSTRAP_NICS);
    script_response(bootstrap_script(service.server_url(), nic_max))
}

// ============================================================================
// Administrative handlers
// ============================================================================

/// `GET /api`
pub async fn api_root(State(service): State<Arc<BootService>>) -> Siren {
    let base = service.server_url();
    Siren(entity(
        "roost",
        properties_of(&json!({ "version": env!("CARGO_PKG_VERSION") })),
        [],
        [Some(
            action("create-policy", "Create policy", format!("{}/api/policies", base), "policy")
                .with_method(Method::Post),
        )],
        [
            Some(link("self", format!("{}/api", base))),
            Some(link("nodes", format!("{}/api/nodes", base))),
            Some(link("policies", format!("{}/api/policies", base))),
            Some(link("bootstrap", format!("{}/api/microkernel/bootstrap", base))),
        ],
    ))
}

/// `GET /api/nodes`
pub async fn list_nodes(State(service): State<Arc<BootService>>) -> ApiResult<Siren> {
    let base = service.server_url();
    let nodes = service.nodes().await?;

    Ok(Siren(entity(
        ["nodes", "collection"],
        properties_of(&json!({ "count": nodes.len() })),
        nodes.iter().map(|node| Some(node_entity(base, node))),
        [],
        [Some(link("self", format!("{}/api/nodes", base)))],
    )))
}

/// `GET /api/nodes/{id}`
pub async fn get_node(
    State(service): State<Arc<BootService>>,
    Path(id): Path<u64>,
) -> ApiResult<Siren> {
    let node = service
        .node(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("node not found: {}", id)))?;
    Ok(Siren(node_entity(service.server_url(), &node)))
}

/// `POST /api/nodes/{id}/reinstall`
pub async fn reinstall_node(
    State(service): State<Arc<BootService>>,
    Path(id): Path<u64>,
) -> ApiResult<Siren> {
    let node = service.reinstall(id).await?;
    Ok(Siren(node_entity(service.server_url(), &node)))
}

/// `POST /api/nodes/{id}/metadata`
pub async fn update_node_metadata(
    State(service): State<Arc<BootService>>,
    Path(id): Path<u64>,
    Json(updates): Json<Map<String, Value>>,
) -> ApiResult<Siren> {
    let node = service.update_metadata(id, updates).await?;
    Ok(Siren(node_entity(service.server_url(), &node)))
}

/// `DELETE /api/nodes/{id}`
pub async fn delete_node(
    State(service): State<Arc<BootService>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    if service.delete_node(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("node not found: {}", id)))
    }
}

async fn policy_siren(service: &BootService, policy: &Policy) -> ApiResult<Siren> {
    let bound = service.bound_count(&policy.name).await?;
    Ok(Siren(policy_entity(service.server_url(), policy, bound)))
}

/// `GET /api/policies`
pub async fn list_policies(State(service): State<Arc<BootService>>) -> ApiResult<Siren> {
    let base = service.server_url();
    let policies = service.policies().await;

    let mut entities = Vec::with_capacity(policies.len());
    for policy in &policies {
        let bound = service.bound_count(&policy.name).await?;
        entities.push(Some(policy_entity(base, policy, bound)));
    }

    Ok(Siren(entity(
        ["policies", "collection"],
        properties_of(&json!({ "count": policies.len() })),
        entities,
        [Some(
            action("create-policy", "Create policy", format!("{}/api/policies", base), "policy")
                .with_method(Method::Post),
        )],
        [Some(link("self", format!("{}/api/policies", base)))],
    )))
}

/// `GET /api/policies/{name}`
pub async fn get_policy(
    State(service): State<Arc<BootService>>,
    Path(name): Path<String>,
) -> ApiResult<Siren> {
    let policy = service
        .policy(&name)
        .await
        .ok_or_else(|| ApiError::not_found(format!("policy not found: {}", name)))?;
    policy_siren(&service, &policy).await
}

/// `POST /api/policies`
pub async fn create_policy(
    State(service): State<Arc<BootService>>,
    Json(policy): Json<Policy>,
) -> ApiResult<(StatusCode, Siren)> {
    let policy = service.create_policy(policy).await?;
    info!("Policy '{}' created via API", policy.name);
    Ok((StatusCode::CREATED, policy_siren(&service, &policy).await?))
}

/// `POST /api/policies/{name}/enable`
pub async fn enable_policy(
    State(service): State<Arc<BootService>>,
    Path(name): Path<String>,
) -> ApiResult<Siren> {
    let policy = service.enable_policy(&name).await?;
    policy_siren(&service, &policy).await
}

/// `POST /api/policies/{name}/disable`
pub async fn disable_policy(
    State(service): State<Arc<BootService>>,
    Path(name): Path<String>,
) -> ApiResult<Siren> {
    let policy = service.disable_policy(&name).await?;
    policy_siren(&service, &policy).await
}

/// `DELETE /api/policies/{name}`
pub async fn delete_policy(
    State(service): State<Arc<BootService>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    service.remove_policy(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_router, create_test_service, TEST_SERVER_URL};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    fn class_of(doc: &Value) -> Vec<&str> {
        doc["class"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap())
            .collect()
    }

    fn action_names(doc: &Value) -> Vec<&str> {
        doc["actions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_boot_unknown_node_serves_microkernel() {
        let app = create_test_router(vec![]);
        let response = app
            .oneshot(get_request("/svc/boot?net0=00:11:22:33:44:55&net1="))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.starts_with("#!ipxe"));
        assert!(body.contains("vmlinuz0"));
    }

    #[tokio::test]
    async fn test_boot_without_macs_is_bad_request() {
        let app = create_test_router(vec![]);
        let (status, body) = send(app, get_request("/svc/boot?net0=")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(err.error, "Bad Request");
    }

    #[tokio::test]
    async fn test_checkin_binds_and_boot_serves_installer() {
        let service = create_test_service(vec![Policy::new("catchall", 10, "centos").with_image("centos-7")]);
        let app = router(service);

        let (status, body) = send(
            app.clone(),
            json_request(
                "POST",
                "/svc/checkin",
                json!({ "macs": ["00:11:22:33:44:55"], "facts": { "memorysize": "4096" } }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["action"], "reboot");
        assert_eq!(doc["node"]["binding"]["policy"], "catchall");

        let (status, body) = send(app.clone(), get_request("/svc/boot?mac=00-11-22-33-44-55")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/images/centos-7/vmlinuz"));

        let (status, body) = send(app.clone(), get_request("/svc/stage-done/1")).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["install_state"], "installed");

        let (_, body) = send(app, get_request("/svc/boot?net0=00:11:22:33:44:55")).await;
        assert!(body.contains("exit"));
        assert!(!body.contains("sanboot"));
    }

    #[tokio::test]
    async fn test_checkin_without_match_keeps_polling() {
        let app = create_test_router(vec![]);
        let (status, body) = send(
            app,
            json_request("POST", "/svc/checkin", json!({ "macs": ["00:11:22:33:44:55"] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["action"], "none");
        assert_eq!(doc["node"]["install_state"], "unbound");
    }

    #[tokio::test]
    async fn test_stage_done_unknown_node_is_not_found() {
        let app = create_test_router(vec![]);
        let (status, _) = send(app, empty_request("POST", "/svc/stage-done/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bootstrap_script() {
        let app = create_test_router(vec![]);
        let (status, body) = send(app, get_request("/api/microkernel/bootstrap?nic_max=2")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(&format!(
            "{}/svc/boot?net0=${{net0/mac}}&net1=${{net1/mac}}",
            TEST_SERVER_URL
        )));
        assert!(!body.contains("net2"));
    }

    #[tokio::test]
    async fn test_bootstrap_nic_max_is_capped() {
        for nic_max in [40, 300, 70000] {
            let app = create_test_router(vec![]);
            let (status, body) = send(
                app,
                get_request(&format!("/api/microkernel/bootstrap?nic_max={}", nic_max)),
            )
            .await;

            assert_eq!(status, StatusCode::OK, "nic_max={}", nic_max);
            assert!(body.contains("net31=${net31/mac}"));
            assert!(!body.contains("net32"));
        }
    }

    #[tokio::test]
    async fn test_api_root_links() {
        let app = create_test_router(vec![]);
        let response = app.oneshot(get_request("/api")).await.unwrap();
        assert_eq!(response.headers()[CONTENT_TYPE], SIREN_CONTENT_TYPE);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let doc: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(class_of(&doc), vec!["roost"]);
        let rels: Vec<&str> = doc["links"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["rel"][0].as_str().unwrap())
            .collect();
        assert_eq!(rels, vec!["self", "nodes", "policies", "bootstrap"]);
    }

    #[tokio::test]
    async fn test_node_entity_actions_follow_state() {
        let service = create_test_service(vec![Policy::new("catchall", 10, "noop")]);
        let app = router(service.clone());

        // Unbound: no reinstall action
        service.boot(["00:11:22:33:44:55"]).await.unwrap();
        service.disable_policy("catchall").await.unwrap();
        service.reinstall(1).await.unwrap();

        let (status, body) = send(app.clone(), get_request("/api/nodes/1")).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(class_of(&doc), vec!["node", "unbound"]);
        assert_eq!(action_names(&doc), vec!["set-metadata", "delete"]);
        assert_eq!(doc["links"].as_array().unwrap().len(), 1);

        // Bound: reinstall offered, policy linked
        service.enable_policy("catchall").await.unwrap();
        service.boot(["00:11:22:33:44:55"]).await.unwrap();

        let (_, body) = send(app, get_request("/api/nodes/1")).await;
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(class_of(&doc), vec!["node", "installing"]);
        assert_eq!(action_names(&doc), vec!["reinstall", "set-metadata", "delete"]);
        assert_eq!(doc["actions"][0]["method"], "POST");
        assert_eq!(doc["properties"]["name"], "node1");
        assert_eq!(
            doc["links"][1]["href"],
            format!("{}/api/policies/catchall", TEST_SERVER_URL)
        );
    }

    #[tokio::test]
    async fn test_node_lifecycle_via_api() {
        let service = create_test_service(vec![Policy::new("catchall", 10, "noop")]);
        let app = router(service.clone());
        service.boot(["00:11:22:33:44:55"]).await.unwrap();

        let (status, body) = send(
            app.clone(),
            json_request("POST", "/api/nodes/1/metadata", json!({ "sanboot": true, "rack": "r1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["properties"]["metadata"]["sanboot"], true);

        let (status, _) = send(
            app.clone(),
            json_request("POST", "/api/nodes/1/metadata", json!({ "rack": ["r1"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app.clone(), empty_request("POST", "/api/nodes/1/reinstall")).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["properties"]["install_state"], "unbound");

        let (status, body) = send(app.clone(), get_request("/api/nodes")).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["properties"]["count"], 1);
        assert_eq!(doc["entities"].as_array().unwrap().len(), 1);

        let (status, _) = send(app.clone(), empty_request("DELETE", "/api/nodes/1")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app.clone(), empty_request("DELETE", "/api/nodes/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(app, get_request("/api/nodes/1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_policy_crud() {
        let app = create_test_router(vec![]);

        let policy = json!({
            "name": "virtual",
            "line_number": 10,
            "hostname_pattern": "vm${id}",
            "installer_task": "centos",
            "image_ref": "centos-7",
            "rules": [{ "fact": "is_virtual", "op": "eq", "value": "true" }]
        });
        let (status, body) = send(app.clone(), json_request("POST", "/api/policies", policy.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(action_names(&doc), vec!["disable", "delete"]);
        assert_eq!(doc["properties"]["bound_count"], 0);

        // same name again
        let (status, _) = send(app.clone(), json_request("POST", "/api/policies", policy)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // hostname pattern without ${id}
        let bad = json!({
            "name": "bad",
            "line_number": 20,
            "hostname_pattern": "static",
            "installer_task": "centos"
        });
        let (status, body) = send(app.clone(), json_request("POST", "/api/policies", bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_str(&body).unwrap();
        assert!(err.message.contains("hostname_pattern"));

        let (status, body) = send(app.clone(), empty_request("POST", "/api/policies/virtual/disable")).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["properties"]["enabled"], false);
        assert_eq!(action_names(&doc), vec!["enable", "delete"]);

        let (status, body) = send(app.clone(), get_request("/api/policies")).await;
        assert_eq!(status, StatusCode::OK);
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(class_of(&doc), vec!["policies", "collection"]);
        assert_eq!(doc["entities"].as_array().unwrap().len(), 1);

        let (status, _) = send(app.clone(), empty_request("DELETE", "/api/policies/virtual")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app, get_request("/api/policies/virtual")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
