use crate::Context;
use crate::cli::DeleteArgs;
use crate::commands::{self, CliDiagnostics, set};
use crate::ui;
use anyhow::Result;

pub fn run(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let provider = commands::provider(ctx, &args.type_file)?;
    let identity = commands::parse_attrs(&args.attrs)?;

    let raw = match provider.delete_matching(&CliDiagnostics, &args.name, &identity) {
        Ok(raw) => raw,
        Err(e) => {
            if !ctx.quiet {
                ui::hint(e.category().advice());
            }
            return Err(e.into());
        }
    };

    set::finish(ctx, "Deleted", &args.name, &raw)
}
