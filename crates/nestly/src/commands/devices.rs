//! Device listing.

use tabled::Tabled;

use nestly_core::{DeviceRecord, Nest, Snapshot};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, cell};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Online")]
    online: String,
    #[tabled(rename = "Structure")]
    structure: String,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            device_type: d.device_type().unwrap_or("-").to_owned(),
            id: cell(d.get("device_id")),
            name: d.name().unwrap_or("-").to_owned(),
            online: cell(d.get("is_online")),
            structure: cell(d.get("structure_id")),
        }
    }
}

/// Devices matching the filters, in bucket then id order.
fn select(snapshot: &Snapshot, args: &DevicesArgs) -> Vec<DeviceRecord> {
    snapshot
        .iter_devices()
        .filter(|(device_type, _, _)| {
            args.device_type
                .as_deref()
                .is_none_or(|wanted| wanted == *device_type)
        })
        .filter(|(_, _, record)| {
            args.name
                .as_deref()
                .is_none_or(|wanted| record.name() == Some(wanted))
        })
        .map(|(_, _, record)| record.clone())
        .collect()
}

pub async fn handle(args: &DevicesArgs, nest: &Nest, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = super::hydrate(nest).await?;
    let devices = select(&snapshot, args);

    if devices.is_empty() {
        if let Some(ref name) = args.name {
            return Err(CliError::NotFound {
                resource_type: "device".into(),
                identifier: name.clone(),
                list_command: "devices".into(),
            });
        }
    }

    let out = output::render_list(
        global.output,
        &devices,
        |d| DeviceRow::from(d),
        |d| cell(d.get("device_id")),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
