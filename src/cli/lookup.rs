use super::ui;
use crate::core::{LookupError, QueryResult};
use crate::orchestrator::RequestOrchestrator;
use anyhow::{Result, bail};
use comfy_table::Cell;
use futures::future::join_all;
use tracing::info;

type LookupOutcome = (String, Result<QueryResult, LookupError>);

pub async fn run(
    orchestrator: &RequestOrchestrator,
    symbols: &[String],
    investment: u64,
) -> Result<()> {
    info!("Looking up {} symbol(s)...", symbols.len());

    let pb = ui::new_progress_bar(symbols.len() as u64, true);
    pb.set_message("Fetching prices...");

    let lookups = symbols.iter().map(|symbol| {
        let pb_clone = pb.clone();
        async move {
            let res = orchestrator.process(symbol, investment).await;
            pb_clone.inc(1);
            (symbol.clone(), res)
        }
    });

    let outcomes: Vec<LookupOutcome> = join_all(lookups).await;
    pb.finish_and_clear();

    println!("{}", render_outcomes(investment, &outcomes));

    if !outcomes.is_empty() && outcomes.iter().all(|(_, res)| res.is_err()) {
        bail!("None of the requested symbols could be looked up");
    }
    Ok(())
}

fn render_outcomes(investment: u64, outcomes: &[LookupOutcome]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Units"),
        ui::header_cell("Profit"),
        ui::header_cell("Growth"),
        ui::header_cell("Lambos"),
        ui::header_cell("Generated"),
    ]);

    let mut errors = Vec::new();
    for (symbol, res) in outcomes {
        match res {
            Ok(result) => {
                table.add_row(vec![
                    Cell::new(&result.symbol),
                    ui::number_cell(format!("{:.4}", result.number_of_units)),
                    ui::signed_cell(result.profit, ""),
                    ui::signed_cell(result.growth_factor, "x"),
                    ui::number_cell(format!("{:.2}", result.affordability_index)),
                    Cell::new(result.generated_at.format("%Y-%m-%d %H:%M UTC")),
                ]);
            }
            Err(e) => {
                table.add_row(vec![
                    Cell::new(symbol),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(true),
                ]);
                if e.is_retryable() {
                    errors.push(format!("{symbol}: {e} (try again later)"));
                } else {
                    errors.push(format!("{symbol}: {e}"));
                }
            }
        }
    }

    let mut output = format!(
        "Investment: {}\n\n",
        ui::style_text(&investment.to_string(), ui::StyleType::Title)
    );
    output.push_str(&table.to_string());

    for error in errors {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(&error, ui::StyleType::Error)
        ));
    }
    output
}
