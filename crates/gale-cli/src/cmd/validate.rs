use crate::output::{print_json, print_table};
use gale_core::graph::validate_scenario;
use gale_core::registry::KindRegistry;
use std::path::Path;

pub fn run(file: &Path, json: bool) -> anyhow::Result<()> {
    let scenario = super::load_scenario(file)?;
    let graph = validate_scenario(&scenario, &KindRegistry::builtin())?;

    if json {
        #[derive(serde::Serialize)]
        struct ValidateOutput<'a> {
            scenario: &'a str,
            valid: bool,
            actions: usize,
            edges: usize,
        }

        return print_json(&ValidateOutput {
            scenario: &scenario.name,
            valid: true,
            actions: graph.order().len(),
            edges: graph.edges().len(),
        });
    }

    println!("Scenario: {} (valid)", scenario.name);

    let rows: Vec<Vec<String>> = scenario
        .actions
        .iter()
        .map(|a| {
            let deps: Vec<String> = graph
                .edges()
                .iter()
                .filter(|e| e.action == a.name)
                .map(|e| e.dependency.clone())
                .collect();
            vec![
                a.name.clone(),
                a.action_type.to_string(),
                a.instances().to_string(),
                deps.join(", "),
            ]
        })
        .collect();
    print_table(&["NAME", "KIND", "INSTANCES", "DEPENDS ON"], rows);

    Ok(())
}
