//! Commit tool: replace the session's filter and title.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ToolError;
use crate::tool::Tool;
use crate::tools::{sql_parameter, ToolContext};

pub const NAME: &str = "update_dashboard";

#[derive(Debug, Deserialize)]
struct Arguments {
    query: String,
    title: String,
}

/// Validates a query against the source and, if it runs, makes it the
/// session's current filter.
pub struct UpdateDashboardTool {
    ctx: ToolContext,
}

impl UpdateDashboardTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for UpdateDashboardTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Modifies the data presented in the data dashboard, based on the given SQL query, \
         and also updates the title. Pass an empty query to show all rows again."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": sql_parameter(self.ctx.source.as_ref()),
                },
                "title": {
                    "type": "string",
                    "description": "A title to display at the top of the data dashboard, \
                                    summarizing the intent of the SQL query.",
                },
            },
            "required": ["query", "title"],
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: Arguments =
            serde_json::from_value(arguments).map_err(|e| ToolError::invalid_arguments(NAME, e))?;

        if args.query.trim().is_empty() {
            self.ctx.state.clear();
            self.ctx.transcript.push_notice("Filter cleared; showing all rows.");
            info!("Dashboard filter cleared");
            return Ok(Value::Null);
        }

        self.ctx.transcript.push_sql(&args.query);

        // Run once to validate; the result itself is not kept.
        if let Err(e) = self.ctx.source.execute(&args.query) {
            warn!(error = %e, "Dashboard query rejected");
            self.ctx.transcript.push_error(&e.to_string());
            return Err(e.into());
        }

        info!(title = %args.title, "Dashboard updated");
        self.ctx.state.commit(args.query, args.title);
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::QueryState;
    use crate::tools::test_support;
    use crate::transcript::EntryKind;
    use tabula_source::DataSource;

    #[tokio::test]
    async fn test_commit_survivors() {
        let ctx = test_support::context();
        let tool = UpdateDashboardTool::new(ctx.clone());
        let out = tool
            .call(json!({
                "query": "SELECT * FROM titanic WHERE survived = 1",
                "title": "Survivors"
            }))
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
        assert_eq!(ctx.state.sql(), "SELECT * FROM titanic WHERE survived = 1");
        assert_eq!(ctx.state.title().as_deref(), Some("Survivors"));

        let data = ctx.state.current_result(ctx.source.as_ref()).unwrap();
        assert_eq!(data.num_rows(), 342);

        let entries = ctx.transcript.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::SqlBlock);
        assert_eq!(entries[0].text, "SELECT * FROM titanic WHERE survived = 1");
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_state_untouched() {
        let ctx = test_support::context();
        ctx.state.commit("SELECT * FROM titanic WHERE pclass = 1", "First class");
        let before = ctx.state.snapshot();

        let tool = UpdateDashboardTool::new(ctx.clone());
        let err = tool
            .call(json!({"query": "SELECT bogus_col FROM titanic", "title": "Broken"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Query(_)));
        assert!(err.to_string().contains("bogus_col"));
        assert_eq!(ctx.state.snapshot(), before);

        let entries = ctx.transcript.entries();
        assert_eq!(entries[0].kind, EntryKind::SqlBlock);
        assert_eq!(entries[1].kind, EntryKind::ErrorNotice);
        assert!(entries[1].text.contains("bogus_col"));
    }

    #[tokio::test]
    async fn test_write_statement_rejected_without_side_effects() {
        let ctx = test_support::context();
        ctx.state.commit("SELECT * FROM titanic WHERE survived = 1", "Survivors");
        let before = ctx.state.snapshot();

        let tool = UpdateDashboardTool::new(ctx.clone());
        let err = tool
            .call(json!({"query": "DELETE FROM titanic WHERE survived = 0", "title": "Purge"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Query(_)));
        assert_eq!(ctx.state.snapshot(), before);

        let count = ctx.source.execute("SELECT COUNT(*) AS n FROM titanic").unwrap();
        assert_eq!(count.to_records(), json!([{"n": 891}]));
        assert_eq!(ctx.source.unfiltered_data().unwrap().num_rows(), 891);
        assert_eq!(
            ctx.state.current_result(ctx.source.as_ref()).unwrap().num_rows(),
            342
        );
        assert_eq!(ctx.transcript.entries()[1].kind, EntryKind::ErrorNotice);
    }

    #[tokio::test]
    async fn test_failed_commit_is_idempotent() {
        let ctx = test_support::context();
        let tool = UpdateDashboardTool::new(ctx.clone());
        let args = json!({"query": "SELECT nope FROM titanic", "title": "t"});
        assert!(tool.call(args.clone()).await.is_err());
        assert!(tool.call(args).await.is_err());
        assert_eq!(ctx.state.snapshot(), QueryState::Unset);
    }

    #[tokio::test]
    async fn test_blank_query_clears_filter() {
        let ctx = test_support::context();
        ctx.state.commit("SELECT * FROM titanic WHERE survived = 0", "Lost");
        let tool = UpdateDashboardTool::new(ctx.clone());
        tool.call(json!({"query": "  ", "title": "All passengers"}))
            .await
            .unwrap();
        assert_eq!(ctx.state.snapshot(), QueryState::Unset);
        let data = ctx.state.current_result(ctx.source.as_ref()).unwrap();
        assert_eq!(data.num_rows(), 891);
        assert_eq!(ctx.transcript.entries()[0].kind, EntryKind::Notice);
    }

    #[tokio::test]
    async fn test_missing_title_is_invalid() {
        let ctx = test_support::context();
        let tool = UpdateDashboardTool::new(ctx.clone());
        let err = tool
            .call(json!({"query": "SELECT 1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == NAME));
        assert!(ctx.transcript.is_empty());
    }

    #[test]
    fn test_parameters_schema() {
        let tool = UpdateDashboardTool::new(test_support::context());
        let params = tool.parameters();
        assert_eq!(params["required"], json!(["query", "title"]));
        assert_eq!(params["properties"]["query"]["type"], "string");
    }
}
