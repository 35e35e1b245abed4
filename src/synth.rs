//! Answer synthesis
//!
//! Picks a sentence template from keywords in the question, independently of
//! which query produced the rows.

use crate::error::Result;
use crate::executor::Row;
use serde_json::Value;
use tracing::warn;

pub const NO_RESULTS: &str = "No matching results were returned.";

/// Render an answer. Never fails: internal errors become an apology.
pub fn synthesize(question: &str, rows: &[Row]) -> String {
    match try_synthesize(question, rows) {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Answer synthesis failed: {}", e);
            format!("An error occurred while generating the answer: {}", e)
        }
    }
}

fn try_synthesize(question: &str, rows: &[Row]) -> Result<String> {
    let Some(first) = rows.first() else {
        return Ok(NO_RESULTS.to_string());
    };
    let q = question.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if has(&["total", "sum"]) {
        return Ok(format!(
            "The total sales amount is {}.",
            field(first, "total_sales")
        ));
    }
    if has(&["how many", "count"]) {
        return Ok(format!("The total count is {}.", field(first, "count")));
    }
    if has(&["average", "avg"]) {
        return Ok(format!(
            "The average sale amount is {}.",
            field(first, "avg_sale")
        ));
    }
    if has(&["top", "highest"]) {
        return Ok(format!("The top record is: {}", render_row(first)?));
    }
    if has(&["list", "show"]) {
        return Ok(format!(
            "Found {} records. Example: {}",
            rows.len(),
            render_row(first)?
        ));
    }
    Ok(format!(
        "Here are {} results. Example: {}",
        rows.len(),
        render_row(first)?
    ))
}

/// A missing column renders like NULL; the template still fills.
fn field(row: &Row, name: &str) -> String {
    render_scalar(row.get(name).unwrap_or(&Value::Null))
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "not available".to_string(),
        other => other.to_string(),
    }
}

fn render_row(row: &Row) -> Result<String> {
    Ok(serde_json::to_string(row)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_empty_rows_ignore_keywords() {
        for question in ["total sales", "how many sales", "top employee", "list all", "??"] {
            assert_eq!(synthesize(question, &[]), NO_RESULTS);
        }
    }

    #[test]
    fn test_total() {
        let r = rows(json!([{"total_sales": 125000.5}]));
        assert_eq!(
            synthesize("Total sales in 2023", &r),
            "The total sales amount is 125000.5."
        );
    }

    #[test]
    fn test_count() {
        let r = rows(json!([{"count": 57}]));
        assert_eq!(synthesize("How many sales in 2022?", &r), "The total count is 57.");
    }

    #[test]
    fn test_average() {
        let r = rows(json!([{"avg_sale": "4521.75"}]));
        assert_eq!(
            synthesize("average sale in q1 2024", &r),
            "The average sale amount is 4521.75."
        );
    }

    #[test]
    fn test_null_aggregate() {
        let r = rows(json!([{"total_sales": null}]));
        assert_eq!(
            synthesize("total sales last year", &r),
            "The total sales amount is not available."
        );
    }

    #[test]
    fn test_top_renders_whole_row_in_order() {
        let r = rows(json!([{"id": 3, "name": "A", "department": "Sales", "total_sales": 50000}]));
        assert_eq!(
            synthesize("top employee", &r),
            r#"The top record is: {"id":3,"name":"A","department":"Sales","total_sales":50000}"#
        );
    }

    #[test]
    fn test_list_and_generic() {
        let r = rows(json!([{"id": 1, "city": "Pune"}, {"id": 2, "city": "Pune"}]));
        assert_eq!(
            synthesize("list customers from pune", &r),
            r#"Found 2 records. Example: {"id":1,"city":"Pune"}"#
        );
        assert_eq!(
            synthesize("customers from pune", &r),
            r#"Here are 2 results. Example: {"id":1,"city":"Pune"}"#
        );
    }

    #[test]
    fn test_keywords_win_over_query_shape() {
        // A join result asked with "show" renders as a list.
        let r = rows(json!([{"id": 9, "customer_name": "B", "sale_amount": 10}]));
        assert!(synthesize("show sales with customer names", &r).starts_with("Found 1 records."));
    }

    #[test]
    fn test_missing_field_still_fills_template() {
        // "total" outranks "how many" even though a count query ran.
        let r = rows(json!([{"count": 57}]));
        assert_eq!(
            synthesize("How many sales in total in 2022?", &r),
            "The total sales amount is not available."
        );

        let r = rows(json!([{"id": 4, "name": "C", "department": "HR"}]));
        assert_eq!(
            synthesize("total employees in hr", &r),
            "The total sales amount is not available."
        );
        assert_eq!(synthesize("count customers", &r), "The total count is not available.");
    }

    #[test]
    fn test_numeric_aggregates_keep_database_precision() {
        let r: Vec<Row> = serde_json::from_str(
            r#"[{"avg_sale": 4521.7500000000000000, "total_sales": 12345.50}]"#,
        )
        .unwrap();
        assert_eq!(
            synthesize("avg sale in 2023", &r),
            "The average sale amount is 4521.7500000000000000."
        );
        assert_eq!(
            synthesize("total sales in 2023", &r),
            "The total sales amount is 12345.50."
        );
    }
}
