use crate::utils::Workspace;
use colored::Colorize;

pub async fn handle_list(workspace: &Workspace) -> anyhow::Result<i32> {
    let manager = workspace.state_manager();
    let document = manager.read("state").await?;

    if document.is_empty() && document.deposed.is_empty() {
        println!("No resources in state ({}).", manager.state_path().display());
        return Ok(0);
    }

    println!(
        "{} (serial {})",
        manager.state_path().display().to_string().cyan(),
        document.serial
    );
    let width = document.resources.keys().map(String::len).max().unwrap_or(0);
    for record in document.resources.values() {
        println!(
            "  {}  {}  {}",
            format!("{:width$}", record.name).bold(),
            record.provider_id,
            record.resource_type.dimmed()
        );
    }
    for deposed in &document.deposed {
        println!(
            "  {}  {}  {}",
            format!("{:width$}", deposed.name).yellow(),
            deposed.provider_id,
            "(deposed)".yellow()
        );
    }
    Ok(0)
}

pub async fn handle_show(workspace: &Workspace, name: &str) -> anyhow::Result<i32> {
    let document = workspace.state_manager().read("state").await?;
    let Some(record) = document.get(name) else {
        anyhow::bail!("resource '{name}' is not in state");
    };
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(0)
}
