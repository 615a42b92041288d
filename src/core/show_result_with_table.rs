use prettytable::{format, row, Cell, Row, Table};

use crate::models::result::RunReport;

fn ms(us: u64) -> String {
    format!("{:.2} ms", us as f64 / 1000.0)
}

/// Renders the report as the summary and failure tables printed by the CLI.
pub fn render_result_table(result: &RunReport) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);

    table.add_row(row!["Metric", "Value"]);
    table.add_row(row!["Started at", result.started_at]);
    table.add_row(row!["Virtual users", result.virtual_users]);
    table.add_row(row!["Duration", format!("{:.3}s", result.duration_secs)]);
    table.add_row(row!["Elapsed", format!("{:.3}s", result.elapsed_secs)]);
    table.add_row(row!["Iterations", result.total_iterations]);
    table.add_row(row!["Iterations/s", format!("{:.3}", result.iterations_per_second)]);
    table.add_row(row!["Succeeded", result.success_count]);
    table.add_row(row!["Failed", result.failure_count]);
    table.add_row(row!["Success rate", format!("{:.2}%", result.success_rate)]);
    table.add_row(row!["Min latency", ms(result.latency_us.min)]);
    table.add_row(row!["Max latency", ms(result.latency_us.max)]);
    table.add_row(row!["Mean latency", format!("{:.2} ms", result.latency_us.mean / 1000.0)]);
    table.add_row(row!["Median latency", ms(result.latency_us.p50)]);
    table.add_row(row!["95% latency", ms(result.latency_us.p95)]);
    table.add_row(row!["99% latency", ms(result.latency_us.p99)]);
    let mut rendered = format!("Results:\n{}", table);

    if !result.failures.is_empty() {
        let mut errors_table = Table::new();
        errors_table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        errors_table.add_row(row!["Failure", "Count"]);
        for (kind, count) in &result.failures {
            errors_table.add_row(Row::new(vec![
                Cell::new(kind),
                Cell::new(&count.to_string()).style_spec("r"),
            ]));
        }
        rendered.push_str(&format!("Failures:\n{}", errors_table));
    }
    rendered
}
