//! Small HTML builders shared by the dashboard pages.

use crate::report::filters::{escape_list_value, join_list};
use crate::report::{DataTable, FilterOptions, ReportFilter};
use std::fmt::Write;

/// Escape HTML special characters.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn empty_state(message: &str) -> String {
    format!(r#"<div class="empty-state">{}</div>"#, escape(message))
}

pub fn error_message(message: &str) -> String {
    format!(r#"<div class="error-message">{}</div>"#, escape(message))
}

/// A row of stat cards. Values are escaped; the optional class styles the value.
pub fn stat_cards(cards: &[(&str, String, Option<&str>)]) -> String {
    let mut html = String::from(r#"<div class="grid grid-stats">"#);
    for (label, value, class) in cards {
        let class = class.map(|c| format!(" {}", c)).unwrap_or_default();
        let _ = write!(
            html,
            r#"<div class="card stat"><div class="stat-value{}">{}</div><div class="stat-label">{}</div></div>"#,
            class,
            escape(value),
            escape(label)
        );
    }
    html.push_str("</div>");
    html
}

/// Horizontal bars scaled to the largest value.
pub fn bar_chart<F>(rows: &[(String, f64)], format_value: F) -> String
where
    F: Fn(f64) -> String,
{
    if rows.is_empty() {
        return empty_state("No data for the selected filters");
    }
    let max = rows.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let mut html = String::from(r#"<div class="bars">"#);
    for (label, value) in rows {
        let width = if max > 0.0 { value / max * 100.0 } else { 0.0 };
        let _ = write!(
            html,
            r#"<div class="bar-row"><span class="bar-label" title="{label}">{label}</span><div class="bar-container"><div class="bar" style="width: {width:.1}%;"></div></div><span class="bar-value">{value}</span></div>"#,
            label = escape(label),
            width = width,
            value = escape(&format_value(*value)),
        );
    }
    html.push_str("</div>");
    html
}

pub fn count_rows(rows: &[(String, i64)]) -> Vec<(String, f64)> {
    rows.iter().map(|(label, n)| (label.clone(), *n as f64)).collect()
}

/// Completed vs in-progress split with a legend.
pub fn completion_bar(completed: usize, in_progress: usize) -> String {
    let total = completed + in_progress;
    if total == 0 {
        return empty_state("No work items for the selected filters");
    }
    let mut html = String::from(r#"<div class="status-bar">"#);
    let mut legend = String::from(r#"<div class="status-legend">"#);
    for (class, label, count) in [("completed", "Completed", completed), ("in_progress", "In Progress", in_progress)] {
        if count == 0 {
            continue;
        }
        let _ = write!(
            html,
            r#"<div class="status-segment {}" style="flex-grow: {};" title="{}: {}">{}</div>"#,
            class, count, label, count, count
        );
        let _ = write!(
            legend,
            r#"<div class="legend-item"><span class="legend-dot {}"></span>{}: {} ({:.1}%)</div>"#,
            class,
            label,
            count,
            count as f64 / total as f64 * 100.0
        );
    }
    html.push_str("</div>");
    legend.push_str("</div>");
    html + &legend
}

/// Render a table with every cell escaped. Columns listed in `numeric`
/// are right-aligned.
pub fn table(data: &DataTable, numeric: &[&str]) -> String {
    if data.is_empty() {
        return empty_state("No rows for the selected filters");
    }
    let is_numeric: Vec<bool> = data.columns.iter().map(|c| numeric.contains(&c.as_str())).collect();
    let mut html = String::from(r#"<div class="table-scroll"><table><thead><tr>"#);
    for (column, right) in data.columns.iter().zip(&is_numeric) {
        let class = if *right { r#" class="number""# } else { "" };
        let _ = write!(html, "<th{}>{}</th>", class, escape(column));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &data.rows {
        html.push_str("<tr>");
        for (cell, right) in row.iter().zip(&is_numeric) {
            let class = if *right { r#" class="number""# } else { "" };
            let _ = write!(html, "<td{}>{}</td>", class, escape(cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></div>");
    html
}

fn list_input(name: &str, label: &str, selected: &[String], options: &[String]) -> String {
    let list_id = format!("{}-options", name);
    let mut html = format!(
        r#"<label>{label}<input name="{name}" list="{list_id}" placeholder="all" value="{value}"></label><datalist id="{list_id}">"#,
        label = label,
        name = name,
        list_id = list_id,
        value = escape(&join_list(selected)),
    );
    for option in options {
        let _ = write!(html, r#"<option value="{}">"#, escape(&escape_list_value(option)));
    }
    html.push_str("</datalist>");
    html
}

/// GET form over the shared filter. `extra` adds hidden fields a page needs
/// to keep, such as the selected board.
pub fn filter_form(action: &str, filter: &ReportFilter, options: &FilterOptions, extra: &[(&str, &str)]) -> String {
    let mut html = format!(
        r#"<div class="card filters"><form method="get" action="{}">"#,
        escape(action)
    );
    let _ = write!(
        html,
        r#"<label>From<input type="date" name="from" value="{}"></label><label>To<input type="date" name="to" value="{}"></label>"#,
        filter.start.format("%Y-%m-%d"),
        filter.end.format("%Y-%m-%d")
    );
    html.push_str(&list_input("assignees", "Assignees", &filter.assignees, &options.assignees));
    html.push_str(&list_input("authors", "Authors", &filter.authors, &options.authors));
    html.push_str(&list_input("work_types", "Work types", &filter.work_types, &options.work_types));
    html.push_str(&list_input("priorities", "Priorities", &filter.priorities, &options.priorities));
    html.push_str(&list_input("boards", "Boards", &filter.boards, &options.boards));
    html.push_str(&list_input("lanes", "Lanes", &filter.lanes, &options.lanes));

    html.push_str(r#"<label>Completion<select name="completion">"#);
    for (value, label) in [("all", "All"), ("completed", "Completed"), ("in_progress", "In progress")] {
        let selected = if filter.completion.as_str() == value { " selected" } else { "" };
        let _ = write!(html, r#"<option value="{}"{}>{}</option>"#, value, selected, label);
    }
    html.push_str("</select></label>");

    for (name, value) in extra {
        let _ = write!(
            html,
            r#"<input type="hidden" name="{}" value="{}">"#,
            escape(name),
            escape(value)
        );
    }
    let _ = write!(
        html,
        r#"<button type="submit">Apply</button><a class="button secondary" href="{}">Reset</a></form></div>"#,
        escape(action)
    );
    html
}
