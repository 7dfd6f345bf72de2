// # Infoblox WAPI Object Store
//
// This crate provides an ObjectStore backed by the Infoblox WAPI REST
// interface, so the reconciler can manage `record:srv` objects on a grid.
//
// ## Scope
//
// - One HTTP request per ObjectStore call
// - Full error propagation; retries and scheduling belong to the caller
// - No caching; every lookup goes to the grid
//
// ## Security Requirements
//
// - The password NEVER appears in logs or Debug output
// - Credentials are supplied through configuration only
//
// ## API Reference
//
// - Fetch:  GET    `{base}/{ref}?_return_fields=...`
// - Search: GET    `{base}/record:srv?*{key}={value}&_return_fields=...`
// - Create: POST   `{base}/record:srv?_return_fields=...&_return_as_object=1`
// - Update: PUT    `{base}/{ref}?_return_fields=...&_return_as_object=1`
// - Delete: DELETE `{base}/{ref}`
//
// where `{base}` is `{url}/wapi/v{version}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use srvsync_core::config::ObjectStoreConfig;
use srvsync_core::record::{AttributeSet, RemoteObject, ResourceKind, SrvFields};
use srvsync_core::traits::{ObjectStore, ObjectStoreFactory};
use srvsync_core::{Error, Result};
use std::collections::BTreeMap;
use std::time::Duration;

const STORE_NAME: &str = "wapi";

/// Fields requested on every read and write
const RETURN_FIELDS: &str = "name,view,priority,weight,port,target,ttl,use_ttl,comment,extattrs";

/// Infoblox WAPI object store
///
/// # Security
///
/// The Debug implementation does NOT expose the password.
pub struct WapiObjectStore {
    /// `{url}/wapi/v{version}`
    base_url: String,

    /// WAPI user
    username: String,

    /// WAPI password
    /// ⚠️ NEVER log this value
    password: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for WapiObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WapiObjectStore")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl WapiObjectStore {
    /// Create a new WAPI object store
    ///
    /// # Parameters
    ///
    /// - `url`: Grid master URL, e.g. `https://gm.example.com`
    /// - `username` / `password`: WAPI credentials (basic auth)
    /// - `wapi_version`: WAPI version, e.g. `2.7`
    /// - `verify_tls`: Verify the server certificate
    /// - `timeout`: Per-request HTTP timeout
    ///
    /// # Errors
    ///
    /// `Error::Config` if the credentials are empty or the HTTP client
    /// cannot be built.
    pub fn new(
        url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        wapi_version: &str,
        verify_tls: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(Error::config("WAPI username and password are required"));
        }

        if !verify_tls {
            tracing::warn!("TLS certificate verification disabled for {}", url);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url(url, wapi_version),
            username,
            password,
            client,
        })
    }

    /// Base URL all object paths are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body, what));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("{}: response is not JSON: {}", what, e)))
    }
}

#[async_trait]
impl ObjectStore for WapiObjectStore {
    async fn fetch_by_reference(&self, reference: &str) -> Result<RemoteObject> {
        tracing::debug!("Fetching {}", reference);
        let request = self
            .client
            .get(self.object_url(reference))
            .query(&[("_return_fields", RETURN_FIELDS)]);
        let body = self.send(request, reference).await?;
        decode_record(body)
    }

    async fn search_by_attribute(
        &self,
        kind: ResourceKind,
        key: &str,
        value: &str,
    ) -> Result<Vec<RemoteObject>> {
        tracing::debug!("Searching {} for {}={}", kind, key, value);
        let request = self.client.get(self.object_url(kind.wire_name())).query(&[
            (format!("*{}", key).as_str(), value),
            ("_return_fields", RETURN_FIELDS),
        ]);
        let body = self.send(request, kind.wire_name()).await?;
        decode_records(body)
    }

    async fn create(
        &self,
        kind: ResourceKind,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject> {
        tracing::info!("POST {} {}", kind, fields.name);
        let request = self
            .client
            .post(self.object_url(kind.wire_name()))
            .query(&[("_return_fields", RETURN_FIELDS), ("_return_as_object", "1")])
            .json(&encode_write(fields, attributes, true));
        let body = self.send(request, kind.wire_name()).await?;
        decode_result(body)
    }

    async fn update(
        &self,
        reference: &str,
        fields: &SrvFields,
        attributes: &AttributeSet,
    ) -> Result<RemoteObject> {
        tracing::info!("PUT {}", reference);
        let request = self
            .client
            .put(self.object_url(reference))
            .query(&[("_return_fields", RETURN_FIELDS), ("_return_as_object", "1")])
            .json(&encode_write(fields, attributes, false));
        let body = self.send(request, reference).await?;
        decode_result(body)
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        tracing::info!("DELETE {}", reference);
        let request = self.client.delete(self.object_url(reference));
        self.send(request, reference).await?;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// `{url}/wapi/v{version}`, tolerant of a trailing slash or a `v` prefix
fn base_url(url: &str, wapi_version: &str) -> String {
    format!(
        "{}/wapi/v{}",
        url.trim_end_matches('/'),
        wapi_version.trim_start_matches('v')
    )
}

/// Map a non-success HTTP status to an error
///
/// The grid reports a stale reference as a 400 whose body mentions "not
/// found", so that case maps to `NotFound` as well.
fn status_error(status: u16, body: &str, what: &str) -> Error {
    match status {
        401 | 403 => Error::store(
            STORE_NAME,
            format!(
                "Authentication failed: invalid credentials or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{} (status {})", what, status)),
        400 if body.to_lowercase().contains("not found") => {
            Error::not_found(format!("{}: {}", what, wapi_error_text(body)))
        }
        429 => Error::store(
            STORE_NAME,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::store(
            STORE_NAME,
            format!("Grid server error (transient): {} - {}", status, wapi_error_text(body)),
        ),
        _ => Error::store(
            STORE_NAME,
            format!("Request failed: {} - {}", status, wapi_error_text(body)),
        ),
    }
}

/// The `text` of a WAPI error body, or the raw body
fn wapi_error_text(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("text").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Extensible attribute as it travels on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireExtAttr {
    value: Value,
}

/// `record:srv` as returned by the grid
#[derive(Debug, Deserialize)]
struct WireSrvRecord {
    #[serde(rename = "_ref")]
    reference: String,
    #[serde(default)]
    view: String,
    name: String,
    priority: u32,
    weight: u32,
    port: u32,
    target: String,
    #[serde(default)]
    ttl: Option<u32>,
    #[serde(default)]
    use_ttl: bool,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    extattrs: BTreeMap<String, WireExtAttr>,
}

impl From<WireSrvRecord> for RemoteObject {
    fn from(wire: WireSrvRecord) -> Self {
        RemoteObject {
            reference: wire.reference,
            dns_view: wire.view,
            name: wire.name,
            priority: wire.priority,
            weight: wire.weight,
            port: wire.port,
            target: wire.target,
            ttl: wire.ttl,
            use_ttl: wire.use_ttl,
            comment: wire.comment.unwrap_or_default(),
            attributes: wire
                .extattrs
                .into_iter()
                .map(|(key, attr)| (key, attr.value))
                .collect(),
        }
    }
}

/// Write payload for POST and PUT
#[derive(Debug, Serialize)]
struct WireSrvWrite<'a> {
    name: &'a str,
    priority: u32,
    weight: u32,
    port: u32,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    view: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    use_ttl: bool,
    comment: &'a str,
    extattrs: BTreeMap<&'a str, WireExtAttr>,
}

/// Encode a write; the view is creation-only and left out of updates
fn encode_write<'a>(
    fields: &'a SrvFields,
    attributes: &'a AttributeSet,
    include_view: bool,
) -> WireSrvWrite<'a> {
    WireSrvWrite {
        name: &fields.name,
        priority: fields.priority,
        weight: fields.weight,
        port: fields.port,
        target: &fields.target,
        view: include_view.then_some(fields.dns_view.as_str()),
        ttl: fields.ttl.seconds(),
        use_ttl: fields.ttl.is_set(),
        comment: &fields.comment,
        extattrs: attributes
            .iter()
            .map(|(key, value)| {
                (
                    key.as_str(),
                    WireExtAttr {
                        value: value.clone(),
                    },
                )
            })
            .collect(),
    }
}

fn decode_record(body: Value) -> Result<RemoteObject> {
    serde_json::from_value::<WireSrvRecord>(body)
        .map(RemoteObject::from)
        .map_err(|e| Error::decode(format!("malformed record:srv object: {}", e)))
}

fn decode_records(body: Value) -> Result<Vec<RemoteObject>> {
    match body {
        Value::Array(items) => items.into_iter().map(decode_record).collect(),
        other => Err(Error::decode(format!(
            "expected a list of record:srv objects, got {}",
            other
        ))),
    }
}

/// Decode a `_return_as_object=1` response: `{"result": {...}}`
fn decode_result(body: Value) -> Result<RemoteObject> {
    match body {
        Value::Object(mut map) => match map.remove("result") {
            Some(result) => decode_record(result),
            None => Err(Error::decode("response has no 'result' member")),
        },
        other => Err(Error::decode(format!(
            "expected a result object, got {}",
            other
        ))),
    }
}

/// Factory for creating WAPI object stores
pub struct WapiStoreFactory;

impl ObjectStoreFactory for WapiStoreFactory {
    fn create(&self, config: &ObjectStoreConfig) -> Result<Box<dyn ObjectStore>> {
        match config {
            ObjectStoreConfig::Wapi {
                url,
                username,
                password,
                wapi_version,
                verify_tls,
                timeout_secs,
            } => Ok(Box::new(WapiObjectStore::new(
                url,
                username.clone(),
                password.clone(),
                wapi_version,
                *verify_tls,
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for WAPI object store")),
        }
    }
}

/// Register the WAPI object store with a registry
///
/// # Example
///
/// ```rust
/// use srvsync_core::StoreRegistry;
///
/// let registry = StoreRegistry::with_builtin();
/// srvsync_store_wapi::register(&registry);
/// assert!(registry.has_object_store("wapi"));
/// ```
pub fn register(registry: &srvsync_core::StoreRegistry) {
    registry.register_object_store(STORE_NAME, Box::new(WapiStoreFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use srvsync_core::record::{DeclaredResource, Ttl};

    fn wapi_config(password: &str) -> ObjectStoreConfig {
        ObjectStoreConfig::Wapi {
            url: "https://gm.example.com/".to_string(),
            username: "admin".to_string(),
            password: password.to_string(),
            wapi_version: "2.7".to_string(),
            verify_tls: true,
            timeout_secs: 30,
        }
    }

    fn wire_record() -> Value {
        json!({
            "_ref": "record:srv/ZG5zLmJpbmRfc3J2:_sip._udp.example.com/default",
            "view": "default",
            "name": "_sip._udp.example.com",
            "priority": 10,
            "weight": 20,
            "port": 5060,
            "target": "sip.example.com",
            "ttl": 28800,
            "use_ttl": false,
            "extattrs": {
                "Site": { "value": "ams1" },
                "Terraform Internal ID": { "value": "6f1c2a" }
            }
        })
    }

    #[test]
    fn test_factory_creation() {
        let store = WapiStoreFactory.create(&wapi_config("secret"));
        assert!(store.is_ok());
        assert_eq!(store.unwrap().store_name(), "wapi");
    }

    #[test]
    fn test_factory_rejects_other_config() {
        assert!(WapiStoreFactory.create(&ObjectStoreConfig::Memory).is_err());
        assert!(WapiStoreFactory.create(&wapi_config("")).is_err());
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let store = WapiObjectStore::new(
            "https://gm.example.com",
            "admin",
            "hunter2-secret",
            "2.7",
            true,
            Duration::from_secs(5),
        )
        .unwrap();

        let debug_str = format!("{:?}", store);
        assert!(!debug_str.contains("hunter2-secret"));
        assert!(debug_str.contains("WapiObjectStore"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            base_url("https://gm.example.com/", "2.7"),
            "https://gm.example.com/wapi/v2.7"
        );
        assert_eq!(
            base_url("https://gm.example.com", "v2.12"),
            "https://gm.example.com/wapi/v2.12"
        );
    }

    #[test]
    fn test_decode_record() {
        let obj = decode_record(wire_record()).unwrap();
        assert_eq!(obj.reference, "record:srv/ZG5zLmJpbmRfc3J2:_sip._udp.example.com/default");
        assert_eq!(obj.port, 5060);
        assert_eq!(obj.comment, "");
        assert_eq!(obj.effective_ttl(), Ttl::Unset);
        assert_eq!(obj.attributes.get("Site"), Some(&json!("ams1")));
        assert_eq!(obj.internal_id("Terraform Internal ID").unwrap().as_str(), "6f1c2a");
    }

    #[test]
    fn test_decode_failures() {
        let mut missing_port = wire_record();
        missing_port.as_object_mut().unwrap().remove("port");
        assert!(matches!(decode_record(missing_port), Err(Error::Decode(_))));

        let mut bad_port = wire_record();
        bad_port["port"] = json!("5060");
        assert!(matches!(decode_record(bad_port), Err(Error::Decode(_))));

        assert!(matches!(decode_records(json!({})), Err(Error::Decode(_))));
        assert!(matches!(decode_result(wire_record()), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_search_and_result() {
        let found = decode_records(json!([wire_record(), wire_record()])).unwrap();
        assert_eq!(found.len(), 2);
        assert!(decode_records(json!([])).unwrap().is_empty());

        let obj = decode_result(json!({ "result": wire_record() })).unwrap();
        assert_eq!(obj.name, "_sip._udp.example.com");
    }

    #[test]
    fn test_encode_write() {
        let fields = DeclaredResource::new("_sip._udp.example.com", 10, 20, 5060, "sip.example.com")
            .with_dns_view("internal")
            .with_ttl(Ttl::Seconds(300))
            .fields();
        let mut attributes = AttributeSet::new();
        attributes.insert("Site".to_string(), json!("ams1"));

        let create = serde_json::to_value(encode_write(&fields, &attributes, true)).unwrap();
        assert_eq!(create["view"], json!("internal"));
        assert_eq!(create["ttl"], json!(300));
        assert_eq!(create["use_ttl"], json!(true));
        assert_eq!(create["extattrs"], json!({ "Site": { "value": "ams1" } }));

        let update = serde_json::to_value(encode_write(&fields, &attributes, false)).unwrap();
        assert!(update.get("view").is_none(), "view is creation-only");
    }

    #[test]
    fn test_encode_unset_ttl() {
        let fields = DeclaredResource::new("_sip._udp.example.com", 10, 20, 5060, "sip.example.com")
            .fields();
        let payload = serde_json::to_value(encode_write(&fields, &AttributeSet::new(), false)).unwrap();
        assert!(payload.get("ttl").is_none());
        assert_eq!(payload["use_ttl"], json!(false));
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(404, "", "record:srv/abc").is_not_found());

        let stale = r#"{"Error": "AdmConDataNotFoundError: Reference record:srv/abc not found", "code": "Client.Ibap.Data.NotFound", "text": "Reference record:srv/abc not found"}"#;
        let err = status_error(400, stale, "record:srv/abc");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Reference record:srv/abc not found"));

        let invalid = r#"{"Error": "AdmConProtoError: Invalid value for port", "text": "Invalid value for port"}"#;
        let err = status_error(400, invalid, "record:srv");
        assert!(matches!(err, Error::Store { .. }));
        assert!(err.to_string().contains("Invalid value for port"));

        assert!(status_error(401, "", "x").to_string().contains("Authentication failed"));
        assert!(status_error(429, "", "x").to_string().contains("Rate limit"));
        assert!(status_error(503, "busy", "x").to_string().contains("transient"));
    }
}
