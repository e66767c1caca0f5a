pub mod graph;
pub mod timeline;
pub mod validate;

use anyhow::Context;
use gale_core::action::Scenario;
use std::path::Path;

pub fn load_scenario(file: &Path) -> anyhow::Result<Scenario> {
    let doc = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    Scenario::from_yaml(&doc).with_context(|| format!("failed to parse {}", file.display()))
}
