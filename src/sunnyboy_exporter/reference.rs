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

use crate::client::{ClientError, LocaleMap, MetadataMap, SunnyBoyClient};

/// Static tables used to turn sensor keys into human readable names.
///
/// Both tables are loaded once when the exporter starts and never modified afterwards,
/// so they can be shared between concurrent scrapes without any locking.
#[derive(Debug, Default, Clone)]
pub struct ReferenceData {
    locale: LocaleMap,
    metadata: MetadataMap,
}

impl ReferenceData {
    pub fn new(locale: LocaleMap, metadata: MetadataMap) -> Self {
        ReferenceData { locale, metadata }
    }

    /// Fetch the locale and metadata tables from the device, failing if either of them
    /// cannot be fetched or decoded.
    pub async fn load(client: &SunnyBoyClient) -> Result<Self, ClientError> {
        let locale = client.locale().await?;
        tracing::debug!(message = "loaded locale table", entries = locale.len());

        let metadata = client.metadata().await?;
        tracing::debug!(message = "loaded metadata table", entries = metadata.len());

        Ok(Self::new(locale, metadata))
    }

    /// Display name for a sensor or an empty string if the sensor has no metadata, the
    /// metadata has no tag ID, or the tag ID isn't in the locale table.
    pub fn display_name(&self, sensor: &str) -> &str {
        self.metadata
            .get(sensor)
            .and_then(|m| m.tag_id)
            .and_then(|id| self.locale.get(&id.to_string()))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn locale(&self) -> &LocaleMap {
        &self.locale
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }
}

#[cfg(test)]
mod test {
    use super::ReferenceData;
    use crate::client::{ClientError, Metadata, SunnyBoyClient, LOCALE_PATH, METADATA_PATH};
    use reqwest::Client;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reference() -> ReferenceData {
        let locale = HashMap::from([("7021".to_owned(), "Voltage".to_owned())]);
        let metadata = HashMap::from([
            (
                "6100_40263F00".to_owned(),
                Metadata {
                    tag_id: Some(7021),
                    unit: Some(0),
                },
            ),
            (
                "6100_00411E00".to_owned(),
                Metadata {
                    tag_id: Some(9999),
                    unit: None,
                },
            ),
            ("6180_08214800".to_owned(), Metadata::default()),
        ]);

        ReferenceData::new(locale, metadata)
    }

    #[test]
    fn test_display_name_found() {
        assert_eq!("Voltage", reference().display_name("6100_40263F00"));
    }

    #[test]
    fn test_display_name_missing_metadata() {
        assert_eq!("", reference().display_name("6400_00260100"));
    }

    #[test]
    fn test_display_name_missing_locale() {
        assert_eq!("", reference().display_name("6100_00411E00"));
    }

    #[test]
    fn test_display_name_missing_tag_id() {
        assert_eq!("", reference().display_name("6180_08214800"));
    }

    #[tokio::test]
    async fn test_load_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LOCALE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"7021": "Voltage"}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(METADATA_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"6100_40263F00": {"TagIdEvtMsg": 7021, "Unit": 0}}"#),
            )
            .mount(&server)
            .await;

        let client = SunnyBoyClient::new(Client::new(), &server.uri()).unwrap();
        let reference = ReferenceData::load(&client).await.unwrap();

        assert_eq!(1, reference.locale().len());
        assert_eq!(1, reference.metadata().len());
        assert_eq!("Voltage", reference.display_name("6100_40263F00"));
    }

    #[tokio::test]
    async fn test_load_metadata_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LOCALE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"7021": "Voltage"}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(METADATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
            .mount(&server)
            .await;

        let client = SunnyBoyClient::new(Client::new(), &server.uri()).unwrap();
        let res = ReferenceData::load(&client).await;

        assert!(matches!(res, Err(ClientError::Decode(METADATA_PATH, _))));
    }
}
