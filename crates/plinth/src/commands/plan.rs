use crate::render;
use crate::utils::Workspace;
use colored::Colorize;

pub async fn handle(workspace: &Workspace) -> anyhow::Result<i32> {
    let engine = workspace.engine(None);
    let graph = engine.build_graph(&workspace.project)?;
    let snapshot = workspace.state_manager().read("plan").await?;
    let plan = engine.plan(&graph, &snapshot)?;

    println!(
        "{} {}",
        "Plan for".blue(),
        workspace.project.name.cyan().bold()
    );
    println!();
    render::print_plan(&plan);
    Ok(0)
}
