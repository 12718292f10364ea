use std::path::PathBuf;

use compaudit::executor::preview_diff;
use compaudit::parser::read_file_checked;
use compaudit::reporter::{self, Status};
use compaudit::{migration, Approval, EngineConfig};

pub(crate) struct Args {
    pub path: PathBuf,
    pub kind: Option<super::Kind>,
    pub apply: bool,
    pub approve: Vec<String>,
    pub yes: bool,
    pub deep: bool,
    pub format: super::Format,
}

pub(crate) fn run(args: Args, config: EngineConfig) {
    let doc = compaudit::read_document(&args.path, args.kind.map(Into::into))
        .unwrap_or_else(|e| super::fail("migrate", e));
    let plan = migration::plan(&doc, &config);

    for id in &args.approve {
        if !plan.changes.iter().any(|c| c.id == id.as_str()) {
            eprintln!("warning: no change `{id}` in the plan");
        }
    }
    let approval = if args.yes {
        Approval::All
    } else if args.approve.is_empty() {
        Approval::AutomaticOnly
    } else {
        Approval::Selected(args.approve.iter().cloned().collect())
    };

    if args.apply {
        let outcome = compaudit::execute(&args.path, &doc, &plan, &approval, &config)
            .unwrap_or_else(|e| super::fail("migrate", e));
        match args.format {
            super::Format::Text => {
                eprint!("{}", reporter::render_plan_text(&args.path, &plan));
                eprint!("{}", reporter::render_outcome_text(&outcome));
                if args.deep {
                    for d in outcome.after.diagnostics() {
                        eprintln!("  {d}");
                    }
                }
            }
            super::Format::Json => {
                let json = serde_json::to_string_pretty(&serde_json::json!({
                    "plan": plan,
                    "outcome": outcome,
                }))
                .unwrap_or_else(|e| super::fail("migrate", e));
                println!("{json}");
            }
        }
        super::exit_with(Status::of(&outcome.after).exit_code());
        return;
    }

    let staged = compaudit::apply_changes(&doc, &plan, &approval)
        .unwrap_or_else(|e| super::fail("migrate", e));
    let before = read_file_checked(&args.path).unwrap_or_else(|e| super::fail("migrate", e));
    let after = compaudit::render_document(&staged.document)
        .unwrap_or_else(|e| super::fail("migrate", e));
    let diff = if staged.applied.is_empty() {
        String::new()
    } else {
        preview_diff(&super::display(&args.path), &before, &after)
    };
    let validation = compaudit::validate_with(&doc, &config);

    match args.format {
        super::Format::Text => {
            eprint!("{}", reporter::render_plan_text(&args.path, &plan));
            print!("{diff}");
            if args.deep {
                let preview = compaudit::validate_with(&staged.document, &config);
                eprintln!(
                    "after migration: {} error(s), {} warning(s)",
                    preview.errors.len(),
                    preview.warnings.len()
                );
                for d in preview.diagnostics() {
                    eprintln!("  {d}");
                }
            }
            if !staged.applied.is_empty() {
                eprintln!(
                    "\nDry run: re-run with --apply to write {} change(s).",
                    staged.applied.len()
                );
            }
            if !staged.unapproved.is_empty() {
                eprintln!(
                    "{} change(s) need approval: use --approve ID or --yes.",
                    staged.unapproved.len()
                );
            }
        }
        super::Format::Json => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "plan": plan,
                "applied": staged.applied,
                "unapproved": staged.unapproved,
                "manual": staged.manual,
                "diff": diff,
                "validation": validation,
            }))
            .unwrap_or_else(|e| super::fail("migrate", e));
            println!("{json}");
        }
    }
    super::exit_with(Status::of(&validation).exit_code());
}
