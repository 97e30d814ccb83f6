//! Device listing (`-l`)

use std::io::Write;

use serde::Serialize;

use crate::audio::midi::device::{DeviceSelector, MidiBackend, PortDescriptor};
use crate::error::Result;

#[derive(Serialize)]
struct ListedDevice<'a> {
    index: usize,
    display_name: String,
    #[serde(flatten)]
    port: &'a PortDescriptor,
}

/// Write the device list in the two-line text format:
///
/// ```text
/// Dev 0 playsmf Software Synthesizer 0.3.0
///     SoundFont synthesizer on the default audio output
/// ```
pub fn write_devices(out: &mut impl Write, devices: &[(usize, PortDescriptor)]) -> std::io::Result<()> {
    for (index, port) in devices {
        writeln!(out, "Dev {} {}", index, port.display_name())?;
        writeln!(out, "    {}", port.description)?;
    }
    Ok(())
}

/// Write the device list as a JSON array
pub fn write_devices_json(out: &mut impl Write, devices: &[(usize, PortDescriptor)]) -> std::io::Result<()> {
    let listed: Vec<ListedDevice<'_>> = devices
        .iter()
        .map(|(index, port)| ListedDevice {
            index: *index,
            display_name: port.display_name(),
            port,
        })
        .collect();
    serde_json::to_writer_pretty(&mut *out, &listed)?;
    writeln!(out)
}

/// Print every receiver (every device with `all`) to stdout
pub fn print_devices(backend: &dyn MidiBackend, all: bool, json: bool) -> Result<()> {
    let devices = DeviceSelector::new(backend).list_outputs(all)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let written = if json {
        write_devices_json(&mut out, &devices)
    } else {
        write_devices(&mut out, &devices)
    };
    if let Err(e) = written {
        log::warn!("Failed to write device list: {}", e);
    }
    Ok(())
}
