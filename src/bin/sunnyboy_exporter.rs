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

use clap::{Parser, ValueEnum};
use reqwest::Client;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use sunnyboy_exporter::client::SunnyBoyClient;
use sunnyboy_exporter::exporter::SunnyBoyExporter;
use sunnyboy_exporter::http::{self, RequestContext};
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9725);
const DEFAULT_METRICS_PATH: &str = "/metrics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[clap(name = "sunnyboy_exporter", version = clap::crate_version!())]
struct SunnyBoyExporterApplication {
    /// Base URL of the web interface of the Sunny Boy inverter
    #[clap(long = "sunnyboy.url")]
    url: String,

    /// Skip validation of the certificate presented by the inverter. Most inverters use a
    /// self-signed certificate.
    #[clap(
        long = "sunnyboy.skip-cert-validation",
        alias = "sunnyboy.skil-cert-validation",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    skip_cert_validation: bool,

    /// Address to bind to. By default, sunnyboy_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long = "web.listen-address", default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,

    /// Path under which to expose metrics
    #[clap(long = "web.telemetry-path", default_value_t = DEFAULT_METRICS_PATH.into())]
    metrics_path: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long = "log.level", default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Format of log output
    #[clap(long = "log.format", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = SunnyBoyExporterApplication::parse();
    let builder = tracing_subscriber::FmtSubscriber::builder().with_max_level(opts.log_level);
    let res = match opts.log_format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    res.expect("failed to set tracing subscriber");

    if let Err(e) = http::check_metrics_path(&opts.metrics_path) {
        tracing::error!(message = "invalid metrics path", error = %e);
        process::exit(1)
    }

    let http_client = Client::builder()
        .danger_accept_invalid_certs(opts.skip_cert_validation)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!(message = "unable to initialize HTTP client", error = %e);
            process::exit(1)
        });

    let client = SunnyBoyClient::new(http_client, &opts.url).unwrap_or_else(|e| {
        tracing::error!(message = "invalid device URL", error = %e);
        process::exit(1)
    });

    // Locale and metadata are required to name the values from the device so refuse to
    // start if they can't be loaded instead of exporting unnamed values.
    let exporter = SunnyBoyExporter::new(client).await.unwrap_or_else(|e| {
        tracing::error!(message = "error creating the exporter", url = %opts.url, error = %e);
        process::exit(1)
    });

    tracing::info!(
        message = "loaded reference data",
        url = %opts.url,
        locale_entries = exporter.reference().locale().len(),
        metadata_entries = exporter.reference().metadata().len(),
    );

    let context = RequestContext::new(Arc::new(exporter), &opts.metrics_path);
    let app = http::app(context);
    let server = axum::Server::try_bind(&opts.bind).unwrap_or_else(|e| {
        tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
        process::exit(1)
    });

    tracing::info!(message = "server started", address = %opts.bind, metrics_path = %opts.metrics_path);

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
