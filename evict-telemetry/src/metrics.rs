use std::net::{Ipv4Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Port the Prometheus scrape endpoint listens on.
const METRICS_PORT: u16 = 9000;

/// Label attached to every metric to identify the emitting service.
const SERVICE_LABEL: &str = "service";

/// Installs a global Prometheus recorder and starts listening on
/// `0.0.0.0:9000/metrics` for scrapers.
///
/// `service` is attached to every metric as a global label. Must be called from
/// within a tokio runtime since the exporter spawns its listener on it.
pub fn init_metrics(service: &str) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, METRICS_PORT)))
        .add_global_label(SERVICE_LABEL, service)
        .install()
}
