use std::path::Path;

use compaudit::reporter;
use compaudit::EngineConfig;

pub(crate) fn run(
    left: &Path,
    right: &Path,
    kind: Option<super::Kind>,
    format: super::Format,
    config: &EngineConfig,
) {
    let kind = kind.map(Into::into);
    let left = compaudit::read_document(left, kind).unwrap_or_else(|e| super::fail("compare", e));
    let right =
        compaudit::read_document(right, kind).unwrap_or_else(|e| super::fail("compare", e));
    let comparison =
        compaudit::compare(&left, &right, config).unwrap_or_else(|e| super::fail("compare", e));

    match format {
        super::Format::Text => {
            eprint!("{}", reporter::render_comparison_text(&comparison));
            print!("{}", comparison.diff);
        }
        super::Format::Json => {
            let json = serde_json::to_string_pretty(&comparison)
                .unwrap_or_else(|e| super::fail("compare", e));
            println!("{json}");
        }
    }
}
