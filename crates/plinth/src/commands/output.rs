use crate::render;
use crate::utils::Workspace;
use plinth_engine::export_outputs;

pub async fn handle(workspace: &Workspace, name: Option<&str>, json: bool) -> anyhow::Result<i32> {
    let snapshot = workspace.state_manager().read("output").await?;
    let outputs = export_outputs(&workspace.project.outputs, &snapshot, None);

    if let Some(name) = name {
        if workspace.project.output(name).is_none() {
            anyhow::bail!("output '{name}' is not declared");
        }
        let Some(value) = outputs.get(name) else {
            let reason = outputs
                .missing
                .iter()
                .find(|m| m.output() == name)
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("output '{name}' has no value"));
            anyhow::bail!(reason);
        };
        if json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", render::display_value(value));
        }
        return Ok(0);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs.to_json())?);
    } else if outputs.values.is_empty() {
        println!("No outputs. Run `plinth apply --yes` first.");
    } else {
        render::print_outputs(&outputs);
    }
    Ok(0)
}
