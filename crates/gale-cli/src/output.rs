use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Plain-text table with a dashed rule under the header. Columns whose cells
/// are all numeric are right-aligned.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.len());
            }
        }
    }

    let numeric: Vec<bool> = (0..headers.len())
        .map(|i| {
            let mut seen = false;
            for row in &rows {
                match row.get(i) {
                    Some(cell) if !cell.is_empty() => {
                        if cell.parse::<f64>().is_err() {
                            return false;
                        }
                        seen = true;
                    }
                    _ => {}
                }
            }
            seen
        })
        .collect();

    let render = |cells: Vec<(usize, &str)>| -> String {
        cells
            .into_iter()
            .map(|(i, text)| {
                let w = widths.get(i).copied().unwrap_or(0);
                if numeric.get(i).copied().unwrap_or(false) {
                    format!("{text:>w$}")
                } else {
                    format!("{text:<w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!(
        "{}",
        render(headers.iter().copied().enumerate().collect())
    );

    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", rule.join("  "));

    for row in &rows {
        println!(
            "{}",
            render(row.iter().map(String::as_str).enumerate().collect())
        );
    }
}
