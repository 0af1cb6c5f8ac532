use crate::utils::Workspace;
use colored::Colorize;

pub fn handle(workspace: &Workspace) -> anyhow::Result<i32> {
    println!("{}", "Validating project...".blue());
    println!("Project file: {}", workspace.file.display().to_string().cyan());

    let engine = workspace.engine(None);
    let graph = match engine.build_graph(&workspace.project) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Configuration error".red().bold());
            eprintln!("  {}", e);
            return Ok(1);
        }
    };

    let project = &workspace.project;
    println!("{}", "✓ Project is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Project: {}", project.name.cyan());
    println!("  Resources: {}", graph.len());
    for descriptor in graph.topological_order() {
        println!(
            "    - {} ({})",
            descriptor.name.cyan(),
            descriptor.resource_type
        );
    }
    println!("  Variables: {}", project.variables.len());
    println!("  Outputs: {}", project.outputs.len());
    Ok(0)
}
