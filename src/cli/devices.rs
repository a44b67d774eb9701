use std::error::Error;

use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

use crate::drivers::guncon2::transport::list_devices;

#[derive(Tabled)]
struct DeviceRow {
    path: String,
    name: String,
    serial: String,
    interface: i32,
}

pub fn handle_devices() -> Result<(), Box<dyn Error>> {
    let mut devices: Vec<DeviceRow> = list_devices()?
        .into_iter()
        .map(|info| DeviceRow {
            path: info.path().to_string_lossy().to_string(),
            name: info.product_string().unwrap_or_default().to_string(),
            serial: info.serial_number().unwrap_or_default().to_string(),
            interface: info.interface_number(),
        })
        .collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    let count = devices.len();

    let mut table = Table::new(devices);
    table
        .with(Style::modern_rounded())
        .with(Panel::header("GunCon 2 Devices"));
    println!("{table}");
    println!("Found {count} device(s)");

    Ok(())
}
