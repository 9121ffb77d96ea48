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

use crate::client::{ClientError, SunnyBoyClient};
use crate::metrics::{FloatGauge, MetricDescriptor, ScrapeMetrics, UP, VALUE};
use crate::reference::ReferenceData;
use crate::translate::{Sample, SampleTranslator};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Level};

/// Outcome of a single scrape of the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Scrape {
    pub up: bool,
    pub samples: Vec<Sample>,
}

/// Fetches values from a Sunny Boy device each time metrics are requested.
///
/// Construction loads the locale and metadata tables from the device and fails if they
/// aren't available. Each call to `collect()` fetches the dashboard again, nothing is
/// cached between calls. Failures during a scrape are logged and reported via the
/// `sunny_boy_up` gauge, never returned to the caller.
#[derive(Debug)]
pub struct SunnyBoyExporter {
    translator: SampleTranslator,
    up: FloatGauge,
}

impl SunnyBoyExporter {
    pub async fn new(client: SunnyBoyClient) -> Result<Self, ClientError> {
        let reference = ReferenceData::load(&client).await?;
        Ok(Self::from_reference(client, reference))
    }

    pub fn from_reference(client: SunnyBoyClient, reference: ReferenceData) -> Self {
        SunnyBoyExporter {
            translator: SampleTranslator::new(client, Arc::new(reference)),
            up: FloatGauge::default(),
        }
    }

    /// Metric families that may be emitted by `collect()`.
    pub fn describe(&self) -> [MetricDescriptor; 2] {
        [VALUE, UP]
    }

    /// Scrape the device once, updating the `up` gauge based on the result.
    pub async fn collect(&self) -> Scrape {
        let start = Instant::now();

        match self
            .translator
            .translate()
            .instrument(tracing::span!(Level::DEBUG, "sunnyboy_scrape"))
            .await
        {
            Ok(samples) => {
                self.up.set(1.0);
                tracing::debug!(
                    message = "scraped device",
                    num_samples = samples.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                );

                Scrape { up: true, samples }
            }
            Err(e) => {
                self.up.set(0.0);
                tracing::error!(
                    message = "failed to scrape device",
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                );

                Scrape {
                    up: false,
                    samples: Vec::new(),
                }
            }
        }
    }

    /// Scrape the device and render the result in the OpenMetrics text format. The
    /// rendered `sunny_boy_up` reflects this scrape even if others run concurrently.
    pub async fn gather(&self) -> Result<String, fmt::Error> {
        let scrape = self.collect().await;
        let metrics = ScrapeMetrics::new();
        metrics.set_up(scrape.up);
        for sample in &scrape.samples {
            metrics.record(sample);
        }

        metrics.encode()
    }

    /// Whether the most recently finished scrape succeeded.
    pub fn up(&self) -> bool {
        self.up.get() > 0.0
    }

    pub fn reference(&self) -> &ReferenceData {
        self.translator.reference()
    }
}
