use crate::Context;
use crate::cli::RenderArgs;
use crate::commands;
use anyhow::Result;

/// Print the script a get or set would run
pub fn run(ctx: &Context, args: RenderArgs) -> Result<()> {
    let provider = commands::provider(ctx, &args.type_file)?;
    let desired = commands::desired_state(&args.name, &args.attrs)?;

    let script = provider.render(&desired, args.method.into())?;
    print!("{script}");
    if !script.ends_with('\n') {
        println!();
    }
    Ok(())
}
