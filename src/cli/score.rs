use std::path::PathBuf;

use compaudit::reporter::{self, Status};
use compaudit::{Dimension, EngineConfig};

pub(crate) fn run(
    path: PathBuf,
    kind: Option<super::Kind>,
    dimension: Option<super::DimensionArg>,
    format: super::Format,
    config: EngineConfig,
) {
    let doc = compaudit::read_document(&path, kind.map(Into::into))
        .unwrap_or_else(|e| super::fail("score", e));
    let report = compaudit::score_with(&doc, &config);
    let dimension: Option<Dimension> = dimension.map(Into::into);

    match format {
        super::Format::Text => {
            eprint!("{}", reporter::render_score_text(&path, &report, dimension));
        }
        super::Format::Json => {
            let json = match dimension {
                Some(d) => serde_json::to_string_pretty(&compaudit::score_dimension_with(
                    &doc, d, &config,
                )),
                None => serde_json::to_string_pretty(&report),
            }
            .unwrap_or_else(|e| super::fail("score", e));
            println!("{json}");
        }
    }

    let validation = compaudit::validate_with(&doc, &config);
    super::exit_with(Status::of(&validation).exit_code());
}
