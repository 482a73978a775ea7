//! Per-sensor value reads, degraded to `0.0` on any failure.

use std::time::Duration;

use log::error;

use crate::bus::PropertyReader;
use crate::error::BusError;

/// Reading recorded when a fetch fails.
pub const FALLBACK_VALUE: f64 = 0.0;

/// Read one property as `f64`.
///
/// Transport errors, malformed replies, timeouts and NaN payloads all
/// return [`FALLBACK_VALUE`], so one broken sensor cannot abort a tick.
pub fn fetch(
    reader: &dyn PropertyReader,
    service: &str,
    path: &str,
    interface: &str,
    property: &str,
    timeout: Duration,
) -> f64 {
    let result = reader
        .get_property(service, path, interface, property, timeout)
        .map(|v| v.as_f64())
        .and_then(|v| {
            if v.is_nan() {
                Err(BusError::MalformedReply("NaN payload".to_string()))
            } else {
                Ok(v)
            }
        });

    match result {
        Ok(v) => v,
        Err(e) => {
            error!(
                "failed to read sensor value service={service} path={path} \
                 interface={interface} property={property}: {e}"
            );
            FALLBACK_VALUE
        }
    }
}
