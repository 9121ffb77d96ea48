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

use crate::client::{ClientError, DashValues, SunnyBoyClient};
use crate::reference::ReferenceData;
use prometheus_client::encoding::EncodeLabelSet;
use std::sync::Arc;

/// Labels that identify a single dashboard value.
///
/// Field order here is the order labels are rendered in.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ValueLabels {
    pub device: String,
    pub sensor: String,
    pub result: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: ValueLabels,
    pub value: f64,
}

/// Turn nested dashboard values into one labeled sample per numeric value.
///
/// Non-numeric values are skipped. The `id` label is the position of the value within
/// its result kind and the `name` label is resolved through `reference`, falling back
/// to an empty string. Iteration order follows the underlying maps and isn't stable.
pub fn flatten(dash: &DashValues, reference: &ReferenceData) -> Vec<Sample> {
    let mut out = Vec::new();

    for (device, sensors) in &dash.result {
        for (sensor, results) in sensors {
            let name = reference.display_name(sensor);

            for (result, values) in results {
                for (i, entry) in values.iter().enumerate() {
                    if let Some(value) = entry.val.as_f64() {
                        out.push(Sample {
                            labels: ValueLabels {
                                device: device.clone(),
                                sensor: sensor.clone(),
                                result: result.clone(),
                                id: i.to_string(),
                                name: name.to_owned(),
                            },
                            value,
                        });
                    }
                }
            }
        }
    }

    out
}

/// Fetches live dashboard values and converts them to samples.
#[derive(Debug, Clone)]
pub struct SampleTranslator {
    client: SunnyBoyClient,
    reference: Arc<ReferenceData>,
}

impl SampleTranslator {
    pub fn new(client: SunnyBoyClient, reference: Arc<ReferenceData>) -> Self {
        SampleTranslator { client, reference }
    }

    /// Fetch and decode the dashboard, returning every sample it contains or an error
    /// if it could not be fetched or decoded. Partial results are never returned.
    pub async fn translate(&self) -> Result<Vec<Sample>, ClientError> {
        let dash = self.client.dashboard().await?;
        Ok(flatten(&dash, &self.reference))
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }
}
