use crate::output::{print_json, print_table};
use gale_core::graph::build_graph;
use std::path::Path;

pub fn run(file: &Path, json: bool) -> anyhow::Result<()> {
    let scenario = super::load_scenario(file)?;
    let graph = build_graph(&scenario)?;

    if json {
        #[derive(serde::Serialize)]
        struct EdgeOutput<'a> {
            action: &'a str,
            dependency: &'a str,
            kind: &'a str,
        }

        #[derive(serde::Serialize)]
        struct GraphOutput<'a> {
            scenario: &'a str,
            order: &'a [String],
            edges: Vec<EdgeOutput<'a>>,
        }

        let edges: Vec<EdgeOutput> = graph
            .edges()
            .iter()
            .map(|e| EdgeOutput {
                action: &e.action,
                dependency: &e.dependency,
                kind: e.kind.as_str(),
            })
            .collect();

        return print_json(&GraphOutput {
            scenario: &scenario.name,
            order: graph.order(),
            edges,
        });
    }

    println!("Scenario: {}", scenario.name);
    println!("Order: {}", graph.order().join(" -> "));

    if graph.edges().is_empty() {
        println!("\nNo dependencies.");
        return Ok(());
    }

    println!();
    let rows: Vec<Vec<String>> = graph
        .edges()
        .iter()
        .map(|e| {
            vec![
                e.action.clone(),
                e.dependency.clone(),
                e.kind.as_str().to_string(),
            ]
        })
        .collect();
    print_table(&["ACTION", "DEPENDENCY", "KIND"], rows);

    Ok(())
}
