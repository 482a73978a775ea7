//! Sensor discovery with the "nothing to collect" fallback.

use log::{debug, warn};

use crate::bus::{SENSOR_VALUE_INTERFACE, SensorDescriptor, SensorRegistry, SubTree};
use crate::error::BusError;

/// Root of the registry query.
pub const DISCOVERY_ROOT: &str = "/";

/// Unbounded subtree depth.
pub const DISCOVERY_DEPTH: u32 = 0;

/// Query the registry for every object implementing the sensor Value
/// interface. Errors and empty replies both yield an empty map.
pub fn discover(registry: &dyn SensorRegistry) -> SubTree {
    let result = registry
        .get_subtree(DISCOVERY_ROOT, DISCOVERY_DEPTH, &[SENSOR_VALUE_INTERFACE])
        .and_then(|tree| {
            if tree.is_empty() {
                Err(BusError::EmptyResponse(SENSOR_VALUE_INTERFACE.to_string()))
            } else {
                Ok(tree)
            }
        });

    match result {
        Ok(tree) => {
            debug!("discovered {} sensors", tree.len());
            tree
        }
        Err(e) => {
            warn!("sensor discovery failed interface={SENSOR_VALUE_INTERFACE}: {e}");
            SubTree::new()
        }
    }
}

/// Flatten a registry reply into descriptors. Each path is served by the
/// first service listed for it; paths with no service are skipped.
pub fn descriptors(tree: SubTree) -> Vec<SensorDescriptor> {
    tree.into_iter()
        .filter_map(|(path, services)| {
            let (service, interfaces) = services.into_iter().next()?;
            Some(SensorDescriptor {
                path,
                service,
                interfaces,
            })
        })
        .collect()
}
