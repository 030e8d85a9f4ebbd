//! Current time and date tool

use super::{parse_args, ParameterKind, ToolArgs, ToolError, ToolHandler, ToolSpec};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;

pub struct TimeTool;

#[derive(Debug, Default, Deserialize)]
struct TimeInput {
    #[serde(default)]
    query: Option<String>,
}

impl TimeTool {
    pub fn spec() -> ToolSpec {
        ToolSpec::new("time", "Get the current local time, date, or day of the week").optional(
            "query",
            ParameterKind::String,
            "What to report: 'time' (default), 'date', 'day', or 'full' for date and time",
        )
    }
}

/// Render `now` for a free-form query; anything unrecognised reports the time
fn describe(now: NaiveDateTime, query: &str) -> String {
    let query = query.to_lowercase();
    let format = if query.contains("full") || query.contains("datetime") {
        "%A, %B %d, %Y at %I:%M %p"
    } else if query.contains("date") {
        "%A, %B %d, %Y"
    } else if query.contains("day") {
        "%A"
    } else {
        "%I:%M %p"
    };
    now.format(format).to_string()
}

#[async_trait]
impl ToolHandler for TimeTool {
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let input: TimeInput = parse_args(args)?;
        let query = input.query.as_deref().unwrap_or("time");
        Ok(describe(Local::now().naive_local(), query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn fixed() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 0)
            .unwrap()
    }

    #[test]
    fn test_describe_variants() {
        assert_eq!(describe(fixed(), "time"), "02:07 PM");
        assert_eq!(describe(fixed(), "What's the DATE?"), "Tuesday, March 05, 2024");
        assert_eq!(describe(fixed(), "day"), "Tuesday");
        assert_eq!(
            describe(fixed(), "full"),
            "Tuesday, March 05, 2024 at 02:07 PM"
        );
        assert_eq!(
            describe(fixed(), "datetime"),
            "Tuesday, March 05, 2024 at 02:07 PM"
        );
        assert_eq!(describe(fixed(), "whatever"), "02:07 PM");
    }

    #[tokio::test]
    async fn test_execute_without_query() {
        let out = TimeTool.execute(&ToolArgs::new()).await.unwrap();
        assert!(out.ends_with("AM") || out.ends_with("PM"), "got {out}");
    }

    #[tokio::test]
    async fn test_execute_rejects_wrong_type() {
        let args = json!({"query": 5}).as_object().cloned().unwrap();
        let err = TimeTool.execute(&args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
