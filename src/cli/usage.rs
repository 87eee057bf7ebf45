use super::ui;
use crate::core::UsageLogEntry;
use crate::result_cache::ResultCache;
use anyhow::Result;
use comfy_table::Cell;
use std::collections::BTreeSet;

pub async fn run(cache: &ResultCache, limit: usize) -> Result<()> {
    let entries = cache.usage_entries().await?;
    println!("{}", render_usage(&entries, limit));
    Ok(())
}

/// Renders the most recent `limit` entries plus totals over the whole log.
fn render_usage(entries: &[UsageLogEntry], limit: usize) -> String {
    if entries.is_empty() {
        return ui::style_text("No lookups recorded yet", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Symbol"),
        ui::header_cell("Investment"),
        ui::header_cell("Requested at"),
    ]);

    let skip = entries.len().saturating_sub(limit);
    for entry in &entries[skip..] {
        table.add_row(vec![
            ui::number_cell(entry.id.to_string()),
            Cell::new(&entry.symbol),
            ui::number_cell(entry.investment.to_string()),
            Cell::new(entry.generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ]);
    }

    let symbols: BTreeSet<&str> = entries.iter().map(|e| e.symbol.as_str()).collect();
    format!(
        "{}\n{} {}\n{} {}",
        table,
        ui::style_text("Total lookups:", ui::StyleType::TotalLabel),
        ui::style_text(&entries.len().to_string(), ui::StyleType::TotalValue),
        ui::style_text("Distinct symbols:", ui::StyleType::TotalLabel),
        ui::style_text(&symbols.len().to_string(), ui::StyleType::TotalValue),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: u64, symbol: &str, investment: u64) -> UsageLogEntry {
        UsageLogEntry {
            id,
            symbol: symbol.to_string(),
            investment,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_usage_limits_rows_but_counts_everything() {
        let entries = vec![
            entry(1, "BTC", 1000),
            entry(2, "ETH", 250),
            entry(3, "BTC", 5000),
        ];

        let output = render_usage(&entries, 2);

        assert!(!output.contains(" 1000 "));
        assert!(output.contains("250"));
        assert!(output.contains("5000"));
        assert!(output.contains("Total lookups:"));
        assert!(output.contains("Distinct symbols:"));
    }

    #[test]
    fn test_render_usage_empty_log() {
        let output = render_usage(&[], 20);
        assert!(output.contains("No lookups recorded yet"));
    }
}
