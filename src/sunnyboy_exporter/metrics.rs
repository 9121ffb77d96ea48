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

use crate::translate::{Sample, ValueLabels};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::fmt;
use std::sync::atomic::AtomicU64;

/// Gauge holding a floating point value.
pub type FloatGauge = Gauge<f64, AtomicU64>;

/// Name, help text, and label names of a metric family emitted by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

pub const VALUE: MetricDescriptor = MetricDescriptor {
    name: "sunny_boy_value",
    help: "Value from the Sunny Boy API",
    labels: &["device", "sensor", "result", "id", "name"],
};

pub const UP: MetricDescriptor = MetricDescriptor {
    name: "sunny_boy_up",
    help: "Is Sunny Boy scrape successful",
    labels: &[],
};

/// Registry holding the metrics produced by a single scrape.
///
/// A new instance is created for each scrape so that values from a previous scrape
/// are never exposed again, and so that concurrent scrapes each report their own
/// `up` value. `up` starts at 0.
#[derive(Debug)]
pub struct ScrapeMetrics {
    registry: Registry,
    value: Family<ValueLabels, FloatGauge>,
    up: FloatGauge,
}

impl ScrapeMetrics {
    pub fn new() -> Self {
        let value = Family::<ValueLabels, FloatGauge>::default();
        let up = FloatGauge::default();

        let mut registry = Registry::default();
        registry.register(VALUE.name, VALUE.help, value.clone());
        registry.register(UP.name, UP.help, up.clone());

        Self { registry, value, up }
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(if up { 1.0 } else { 0.0 });
    }

    /// Set the gauge for the labels of `sample`. If two samples share the same labels
    /// the last one recorded wins.
    pub fn record(&self, sample: &Sample) {
        self.value.get_or_create(&sample.labels).set(sample.value);
    }

    /// Render all metrics in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for ScrapeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
