use sensor_history_core::{
    SENSOR_VALUE_INTERFACE, VALUE_PROPERTY, descriptors, discover, fetch,
};

pub fn run(hwmon_root: &str, fetch_timeout_ms: u64) {
    let bus = super::make_bus(hwmon_root);
    let timeout = super::fetch_timeout(fetch_timeout_ms);
    let sensors = descriptors(discover(&*bus));

    println!("Sensors under {hwmon_root}:\n");
    println!("{:<30} {:>12}  Path", "Name", "Value");
    println!("{}", "-".repeat(90));
    for sensor in &sensors {
        let value = fetch(
            &*bus,
            &sensor.service,
            &sensor.path,
            SENSOR_VALUE_INTERFACE,
            VALUE_PROPERTY,
            timeout,
        );
        println!("{:<30} {:>12.3}  {}", sensor.leaf_name(), value, sensor.path);
    }
    println!("\n{} sensors found", sensors.len());
}
