use crate::Context;
use crate::cli::SetArgs;
use crate::commands::{self, CliDiagnostics};
use crate::ui;
use anyhow::{Result, bail};
use dsckit::RawInvocationResult;

/// Which host-side verb triggered the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Set,
    Create,
    Update,
}

impl Verb {
    fn past_tense(self) -> &'static str {
        match self {
            Verb::Set => "Applied",
            Verb::Create => "Created",
            Verb::Update => "Updated",
        }
    }
}

pub fn run(ctx: &Context, verb: Verb, args: SetArgs) -> Result<()> {
    let provider = commands::provider(ctx, &args.type_file)?;
    let should = commands::desired_state(&args.name, &args.attrs)?;

    let raw = match verb {
        Verb::Set => provider.set(&CliDiagnostics, &args.name, &should),
        Verb::Create => provider.create(&CliDiagnostics, &args.name, &should),
        Verb::Update => provider.update(&CliDiagnostics, &args.name, &should),
    };
    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            if !ctx.quiet {
                ui::hint(e.category().advice());
            }
            return Err(e.into());
        }
    };

    finish(ctx, verb.past_tense(), &args.name, &raw)
}

/// Print a raw set result and turn an engine-reported error into a failure
pub fn finish(ctx: &Context, done: &str, name: &str, raw: &RawInvocationResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(raw)?);

    if let Some(message) = raw.error_message() {
        bail!("DSC reported an error for '{name}': {message}");
    }
    if !ctx.quiet {
        if raw.reboot_required() {
            ui::warn(&format!("'{name}' needs a reboot to finish applying changes"));
        }
        ui::success(&format!("{done} '{name}'"));
    }
    Ok(())
}
