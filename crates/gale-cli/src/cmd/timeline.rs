use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use chrono::Duration;
use gale_core::action::Action;
use gale_core::distribution::generate_probability_slice;
use std::path::Path;

pub fn run(file: &Path, action_name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let scenario = super::load_scenario(file)?;

    let action = match action_name {
        Some(name) => scenario
            .actions
            .iter()
            .find(|a| a.name == name)
            .with_context(|| format!("no action named '{name}'"))?,
        None => scenario
            .actions
            .iter()
            .find(|a| has_timeline(a))
            .context("no action with a timeline scheduling policy")?,
    };

    let Some(spec) = action.schedule().and_then(|s| s.timeline.as_ref()) else {
        bail!("action '{}' has no timeline scheduling policy", action.name);
    };

    let instances = action.instances();
    let slice = generate_probability_slice(instances, &spec.distribution)?;
    let timeline = slice.apply_to_timeline(
        scenario.created_at,
        Duration::seconds(spec.total_duration_seconds as i64),
    );

    if json {
        #[derive(serde::Serialize)]
        struct TimelineOutput<'a> {
            scenario: &'a str,
            action: &'a str,
            instances: u64,
            weights: &'a [f64],
            instants: &'a [chrono::DateTime<chrono::Utc>],
        }

        return print_json(&TimelineOutput {
            scenario: &scenario.name,
            action: &action.name,
            instances,
            weights: &slice.0,
            instants: &timeline.0,
        });
    }

    println!(
        "Action: {} ({} instances over {}s, {} distribution)",
        action.name, instances, spec.total_duration_seconds, spec.distribution.name
    );

    let rows: Vec<Vec<String>> = slice
        .0
        .iter()
        .zip(timeline.0.iter())
        .enumerate()
        .map(|(i, (weight, instant))| {
            vec![
                (i + 1).to_string(),
                format!("{weight:.2}"),
                instant.to_rfc3339(),
            ]
        })
        .collect();
    print_table(&["#", "WEIGHT", "FIRES AT"], rows);

    Ok(())
}

fn has_timeline(action: &Action) -> bool {
    action
        .schedule()
        .is_some_and(|s| s.timeline.is_some())
}
