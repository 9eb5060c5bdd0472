use crate::goals_source::{self, GoalsSource};
use crate::output::{print_json, print_table};
use remind_core::format_frequency;

pub fn run(source: &GoalsSource, json: bool) -> anyhow::Result<()> {
    let file = goals_source::load(source)?;

    if json {
        return print_json(&serde_json::json!({
            "source": source.describe(),
            "goals": file.goals,
        }));
    }

    if file.goals.is_empty() {
        println!("No goals configured ({}).", source.describe());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = file
        .goals
        .iter()
        .map(|g| vec![g.name.clone(), format_frequency(g.frequency)])
        .collect();
    print_table(&["NAME", "EVERY"], &rows);
    println!();
    println!("{} goal(s) from {}", file.goals.len(), source.describe());
    Ok(())
}
