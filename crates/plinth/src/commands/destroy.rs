use crate::render;
use crate::utils::{EXIT_PARTIAL, Workspace, cancel_on_ctrl_c};
use colored::Colorize;
use plinth_engine::ResourceGraph;

pub async fn handle(workspace: &Workspace, yes: bool) -> anyhow::Result<i32> {
    let engine = workspace.engine(None);
    let manager = workspace.state_manager();

    if !yes {
        let plan = engine.plan(&ResourceGraph::empty(), &manager.read("plan").await?)?;
        if !plan.has_changes() {
            println!("{}", "Nothing to destroy.".green());
            return Ok(0);
        }
        render::print_plan(&plan);
        println!();
        println!(
            "{}",
            "Run `plinth destroy --yes` to delete these resources.".yellow()
        );
        return Ok(0);
    }

    println!(
        "{} {}",
        "Destroying".red(),
        workspace.project.name.cyan().bold()
    );
    let store = manager.open("destroy").await?;
    let cancel = cancel_on_ctrl_c();
    let result = engine.destroy(&store, &cancel).await;
    store.close().await?;
    let outcome = result?;

    println!("Plan: {}", outcome.plan.summary());
    println!();
    render::print_report(&outcome.report);

    Ok(if outcome.is_success() { 0 } else { EXIT_PARTIAL })
}
