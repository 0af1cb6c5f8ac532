use crate::render;
use crate::utils::{EXIT_PARTIAL, Workspace, cancel_on_ctrl_c};
use colored::Colorize;

pub async fn handle(workspace: &Workspace, yes: bool, jobs: Option<usize>) -> anyhow::Result<i32> {
    let engine = workspace.engine(jobs);
    // configuration errors surface before the state is locked
    let graph = engine.build_graph(&workspace.project)?;
    let manager = workspace.state_manager();

    if !yes {
        let plan = engine.plan(&graph, &manager.read("plan").await?)?;
        render::print_plan(&plan);
        if plan.has_changes() {
            println!();
            println!("{}", "Run `plinth apply --yes` to execute this plan.".yellow());
        }
        return Ok(0);
    }

    println!(
        "{} {}",
        "Applying".blue(),
        workspace.project.name.cyan().bold()
    );
    let store = manager.open("apply").await?;
    let cancel = cancel_on_ctrl_c();
    let result = engine.apply(&workspace.project, &store, &cancel).await;
    store.close().await?;
    let outcome = result?;

    println!("Plan: {}", outcome.plan.summary());
    println!();
    render::print_report(&outcome.report);
    render::print_outputs(&outcome.outputs);

    Ok(if outcome.is_success() { 0 } else { EXIT_PARTIAL })
}
