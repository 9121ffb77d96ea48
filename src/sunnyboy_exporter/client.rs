// sunnyboy_exporter - Prometheus metrics exporter for SMA Sunny Boy inverters
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::error;
use std::fmt;

pub const LOCALE_PATH: &str = "/data/l10n/en-US.json";
pub const METADATA_PATH: &str = "/data/ObjectMetadata_Istl.json";
pub const DASHBOARD_PATH: &str = "/dyn/getDashValues.json";

#[derive(Debug)]
pub enum ClientError {
    InvalidUrl(String, String),
    Internal(reqwest::Error),
    Decode(&'static str, serde_json::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(url, reason) => write!(f, "invalid URL {}: {}", url, reason),
            Self::Internal(e) => write!(f, "{}", e),
            Self::Decode(path, e) => write!(f, "unable to decode {}: {}", path, e),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            Self::Decode(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Client for the JSON resources served by the web interface of a Sunny Boy inverter.
///
/// Responses are read in full and decoded regardless of their HTTP status. The device
/// sometimes returns error details as JSON with a non-200 status, so a failure to decode
/// the body is the only thing treated as an error.
#[derive(Debug, Clone)]
pub struct SunnyBoyClient {
    client: Client,
    base_url: String,
}

impl SunnyBoyClient {
    const USER_AGENT: &'static str = concat!("sunnyboy_exporter/", env!("CARGO_PKG_VERSION"));
    const JSON_RESPONSE: &'static str = "application/json";

    /// Create a new client for the device at `base_url`, returning an error if the URL
    /// cannot be parsed.
    pub fn new(client: Client, base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(base_url.to_owned(), e.to_string()))?;
        Ok(SunnyBoyClient {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the raw body of `path`, relative to the base URL of the device.
    pub async fn fetch(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.url(path)?;
        tracing::debug!(message = "making device request", url = %url);

        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if !status.is_success() {
            tracing::debug!(message = "unexpected status from device", status = %status, url = %url);
        }

        let body = res.bytes().await.map_err(ClientError::Internal)?;
        Ok(body.to_vec())
    }

    /// Fetch the table of localized strings, keyed by tag ID.
    pub async fn locale(&self) -> Result<LocaleMap, ClientError> {
        self.fetch_json(LOCALE_PATH).await
    }

    /// Fetch metadata for every sensor the device knows about.
    pub async fn metadata(&self) -> Result<MetadataMap, ClientError> {
        self.fetch_json(METADATA_PATH).await
    }

    /// Fetch current values shown on the device dashboard.
    pub async fn dashboard(&self) -> Result<DashValues, ClientError> {
        self.fetch_json(DASHBOARD_PATH).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, ClientError> {
        let body = self.fetch(path).await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(path, e))
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(raw.clone(), e.to_string()))
    }
}

/// Localized display names keyed by stringified tag ID.
pub type LocaleMap = HashMap<String, String>;

/// Sensor metadata keyed by sensor key (e.g. `6100_40263F00`).
pub type MetadataMap = HashMap<String, Metadata>;

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Metadata {
    #[serde(rename = "TagIdEvtMsg", default)]
    pub tag_id: Option<i64>,
    #[serde(rename = "Unit", default)]
    pub unit: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DashValues {
    #[serde(default, deserialize_with = "nullable_result")]
    pub result: HashMap<String, DeviceResult>,
}

/// Dashboard results as sent by the device, where any level may be `null`.
type NullableResult = Option<HashMap<String, Option<HashMap<String, Option<HashMap<String, Option<Vec<Option<ValueEntry>>>>>>>>>;

/// Decode dashboard results treating `null` at any level as empty. A `null` value
/// entry is kept as a non-numeric value so that the position of later entries
/// doesn't change.
fn nullable_result<'de, D>(deserializer: D) -> Result<HashMap<String, DeviceResult>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = <NullableResult as Deserialize>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(device, sensors)| {
            let sensors = sensors
                .unwrap_or_default()
                .into_iter()
                .map(|(sensor, results)| {
                    let results = results
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(kind, values)| {
                            let values = values
                                .unwrap_or_default()
                                .into_iter()
                                .map(Option::unwrap_or_default)
                                .collect();
                            (kind, values)
                        })
                        .collect();
                    (sensor, results)
                })
                .collect();
            (device, sensors)
        })
        .collect())
}

/// Results for a single device, keyed by sensor key.
pub type DeviceResult = HashMap<String, SensorResult>;

/// Results for a single sensor, keyed by result kind.
pub type SensorResult = HashMap<String, Vec<ValueEntry>>;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct ValueEntry {
    #[serde(default)]
    pub val: Value,
}

/// A dashboard value. Only numbers are exported, everything else (status strings,
/// nulls, nested objects) is kept as `Other` and skipped.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Other(serde_json::Value),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Other(_) => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Other(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod test {
    use super::{ClientError, DashValues, MetadataMap, SunnyBoyClient, Value, DASHBOARD_PATH, LOCALE_PATH};
    use reqwest::Client;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_new_invalid_url() {
        let res = SunnyBoyClient::new(Client::new(), "not a url");
        assert!(matches!(res, Err(ClientError::InvalidUrl(_, _))));
    }

    #[test]
    fn test_new_trailing_slash() {
        let client = SunnyBoyClient::new(Client::new(), "https://192.168.1.20/").unwrap();
        assert_eq!("https://192.168.1.20", client.base_url());
    }

    #[test]
    fn test_decode_dashboard_values() {
        let body = r#"{"result": {"0199-xxxxx9BD": {
            "6100_40263F00": {"1": [{"val": 235.4}, {"val": 12}]},
            "6180_08214800": {"1": [{"val": {"tag": 307}}]},
            "6800_08822000": {"1": [{"val": "SB 3.0"}, {"val": null}, {}]}
        }}}"#;

        let dash: DashValues = serde_json::from_str(body).unwrap();
        let device = &dash.result["0199-xxxxx9BD"];

        let power = &device["6100_40263F00"]["1"];
        assert_eq!(Some(235.4), power[0].val.as_f64());
        assert_eq!(Some(12.0), power[1].val.as_f64());

        let status = &device["6180_08214800"]["1"];
        assert_eq!(None, status[0].val.as_f64());

        let model = &device["6800_08822000"]["1"];
        assert_eq!(Value::Other(serde_json::Value::String("SB 3.0".to_owned())), model[0].val);
        assert_eq!(Value::Other(serde_json::Value::Null), model[1].val);
        assert_eq!(Value::Other(serde_json::Value::Null), model[2].val);
    }

    #[test]
    fn test_decode_dashboard_null_containers() {
        let dash: DashValues = serde_json::from_str(r#"{"result": null}"#).unwrap();
        assert!(dash.result.is_empty());

        let dash: DashValues = serde_json::from_str(r#"{"result": {"d1": null}}"#).unwrap();
        assert!(dash.result["d1"].is_empty());

        let dash: DashValues = serde_json::from_str(r#"{"result": {"d1": {"s1": null}}}"#).unwrap();
        assert!(dash.result["d1"]["s1"].is_empty());

        let dash: DashValues = serde_json::from_str(r#"{"result": {"d1": {"s1": {"r1": null}}}}"#).unwrap();
        assert!(dash.result["d1"]["s1"]["r1"].is_empty());
    }

    #[test]
    fn test_decode_dashboard_null_entry_keeps_position() {
        let dash: DashValues = serde_json::from_str(r#"{"result": {"d1": {"s1": {"r1": [null, {"val": 5}]}}}}"#).unwrap();
        let values = &dash.result["d1"]["s1"]["r1"];

        assert_eq!(2, values.len());
        assert_eq!(None, values[0].val.as_f64());
        assert_eq!(Some(5.0), values[1].val.as_f64());
    }

    #[test]
    fn test_decode_metadata_partial() {
        let body = r#"{
            "6100_40263F00": {"TagIdEvtMsg": 7021, "Unit": 18, "Prio": 1},
            "6100_00411E00": {"Unit": 22},
            "6180_08214800": {"TagIdEvtMsg": null}
        }"#;

        let meta: MetadataMap = serde_json::from_str(body).unwrap();
        assert_eq!(Some(7021), meta["6100_40263F00"].tag_id);
        assert_eq!(Some(18), meta["6100_40263F00"].unit);
        assert_eq!(None, meta["6100_00411E00"].tag_id);
        assert_eq!(None, meta["6180_08214800"].tag_id);
        assert_eq!(None, meta["6180_08214800"].unit);
    }

    #[tokio::test]
    async fn test_fetch_ignores_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DASHBOARD_PATH))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"err": 401}"#))
            .mount(&server)
            .await;

        let client = SunnyBoyClient::new(Client::new(), &server.uri()).unwrap();
        let body = client.fetch(DASHBOARD_PATH).await.unwrap();
        assert_eq!(br#"{"err": 401}"#.to_vec(), body);
    }

    #[tokio::test]
    async fn test_locale_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LOCALE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = SunnyBoyClient::new(Client::new(), &server.uri()).unwrap();
        let res = client.locale().await;
        assert!(matches!(res, Err(ClientError::Decode(LOCALE_PATH, _))));
    }

    #[tokio::test]
    async fn test_fetch_connection_error() {
        // Nothing should be listening on port 1
        let client = SunnyBoyClient::new(Client::new(), "http://127.0.0.1:1").unwrap();
        let res = client.fetch(LOCALE_PATH).await;
        assert!(matches!(res, Err(ClientError::Internal(_))));
    }
}
