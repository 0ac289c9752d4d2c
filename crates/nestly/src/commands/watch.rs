//! `nestly watch`: one line per store signal until the stream ends.

use serde::Serialize;
use tracing::info;

use nestly_core::{Nest, Signal, SignalKind, Snapshot};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct SignalLine<'a> {
    signal: SignalKind,
    devices: usize,
    structures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<&'a Snapshot>,
}

fn render(signal: &Signal, format: OutputFormat) -> String {
    let snapshot = signal.snapshot().map(|s| &**s);
    let line = SignalLine {
        signal: signal.kind(),
        devices: snapshot.map_or(0, Snapshot::device_count),
        structures: snapshot.map_or(0, Snapshot::structure_count),
        snapshot,
    };

    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(&line),
        OutputFormat::Plain => line.signal.to_string(),
        OutputFormat::Table => match snapshot {
            Some(_) => format!(
                "{:<13} {} devices, {} structures",
                line.signal.as_ref(),
                line.devices,
                line.structures
            ),
            None => line.signal.to_string(),
        },
    }
}

pub async fn handle(nest: &Nest, global: &GlobalOpts) -> Result<(), CliError> {
    let format = global.output;
    let quiet = global.quiet;
    let print = move |signal: &Signal| output::print_output(&render(signal, format), quiet);

    let ids = [SignalKind::Hydrated, SignalKind::Update, SignalKind::StreamClosed]
        .map(|kind| nest.subscribe(kind, print));

    let result = tokio::select! {
        result = nest.start_stream() => result.map_err(CliError::from),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, closing stream");
            Ok(())
        }
    };

    for id in ids {
        nest.unsubscribe(id);
    }
    result
}
