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

//! Prometheus metrics exporter for SMA Sunny Boy inverters
//!
//! ## Features
//!
//! `sunnyboy_exporter` reads the live values shown on the dashboard of the local web interface
//! of a [Sunny Boy] solar inverter and emits them as Prometheus metrics. Values are fetched from
//! the device each time Prometheus scrapes the exporter, nothing is cached. The following metrics
//! are emitted.
//!
//! * `sunny_boy_value{device=$DEVICE, sensor=$SENSOR, result=$RESULT, id=$ID, name=$NAME}` - Each
//!   numeric value from the dashboard. `sensor` is the key the device uses for the value (e.g.
//!   `6100_40263F00`) and `name` is the English display name for it, if the device has one.
//! * `sunny_boy_up` - 1 if the most recent scrape of the device succeeded, 0 otherwise.
//!
//! [Sunny Boy]: https://www.sma.de/en/products/solarinverters
//!
//! ## Build
//!
//! `sunnyboy_exporter` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! `sunnyboy_exporter` needs to be told the URL of the web interface of your inverter. At
//! startup it fetches the display names and metadata for every value the device reports and
//! will exit if they can't be loaded.
//!
//! ```text
//! ./sunnyboy_exporter --sunnyboy.url https://192.168.1.20
//! ```
//!
//! Most inverters use a self-signed certificate so certificate validation is skipped by default.
//! Pass `--sunnyboy.skip-cert-validation=false` to enable it.
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9725` at `/metrics`. Liveness and readiness checks
//! are available at `/-/healthy` and `/-/ready`. Add the host running `sunnyboy_exporter` as a
//! target under the Prometheus `scrape_configs` section as described by the example below.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: sunnyboy_exporter
//!   static_configs:
//!   - targets: ['example:9725']
//! ```
//!

pub mod client;
pub mod exporter;
pub mod http;
pub mod metrics;
pub mod reference;
pub mod translate;
