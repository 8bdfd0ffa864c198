use crate::Context;
use crate::cli::GetArgs;
use crate::commands::{self, CliDiagnostics};
use crate::ui;
use anyhow::{Result, bail};
use dsckit::DesiredState;
use serde_json::{Value, json};

pub fn run(ctx: &Context, args: GetArgs) -> Result<()> {
    let provider = commands::provider(ctx, &args.type_file)?;
    let identity = commands::parse_attrs(&args.attrs)?;

    let filters: Vec<DesiredState> = args
        .names
        .iter()
        .map(|name| {
            let mut filter = identity.clone();
            filter.insert("name", name.as_str());
            filter
        })
        .collect();

    let results = provider.get(&CliDiagnostics, &filters);

    let mut failed = 0usize;
    let mut entries = Vec::with_capacity(results.len());
    for (name, result) in args.names.iter().zip(results) {
        match result {
            Ok(state) => entries.push(Value::Object(state)),
            Err(e) => {
                failed += 1;
                if !ctx.quiet {
                    ui::report(name, &e);
                }
                entries.push(json!({ "name": name, "error": e.to_string() }));
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&entries)?);

    if failed > 0 {
        bail!("{failed} of {} resource(s) could not be read", entries.len());
    }
    Ok(())
}
