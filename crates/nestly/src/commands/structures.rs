//! Structure listing.

use tabled::Tabled;

use nestly_core::{Nest, StructureRecord};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, cell};

#[derive(Tabled)]
struct StructureRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Away")]
    away: String,
    #[tabled(rename = "Time Zone")]
    time_zone: String,
}

fn row((id, s): &(String, StructureRecord)) -> StructureRow {
    StructureRow {
        id: id.clone(),
        name: s.name().unwrap_or("-").to_owned(),
        away: s.away().unwrap_or("-").to_owned(),
        time_zone: cell(s.get("time_zone")),
    }
}

pub async fn handle(nest: &Nest, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = super::hydrate(nest).await?;
    let structures: Vec<(String, StructureRecord)> = snapshot
        .structures
        .iter()
        .map(|(id, s)| (id.clone(), s.clone()))
        .collect();

    // JSON keeps the id-keyed map the API reports.
    let out = match global.output {
        OutputFormat::Json => output::render_json_pretty(&snapshot.structures),
        OutputFormat::JsonCompact => output::render_json_compact(&snapshot.structures),
        OutputFormat::Table | OutputFormat::Plain => {
            output::render_list(global.output, &structures, row, |(id, _)| id.clone())
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
