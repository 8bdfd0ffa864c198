use crate::cli::TypesCommand;
use crate::commands;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use dsckit::ResourceTypeDefinition;

pub fn run(cmd: TypesCommand) -> Result<()> {
    match cmd {
        TypesCommand::Show { type_file, json } => {
            let definition = commands::load_type(&type_file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(definition.as_ref())?);
            } else {
                show(&definition);
            }
            Ok(())
        }
    }
}

fn show(definition: &ResourceTypeDefinition) {
    ui::header(&definition.name);
    ui::kv("friendly name", &definition.friendly_name);
    ui::kv("resource", &definition.resource_name);
    ui::kv(
        "module",
        &format!("{} {}", definition.module_name, definition.module_version),
    );

    ui::section(&format!("Attributes ({})", definition.attributes.len()));
    for (name, spec) in &definition.attributes {
        let mut flags = Vec::new();
        if spec.is_enum() {
            flags.push("enum");
        }
        if spec.mof_is_embedded {
            flags.push("embedded");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };

        println!(
            "  {} {} {}{}",
            name.bold(),
            spec.value_type,
            format!("({})", spec.mof_type).dimmed(),
            flags.dimmed()
        );
    }
}
