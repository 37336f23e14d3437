//! Preview tool: run a query and show the agent its result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::render;
use crate::tool::Tool;
use crate::tools::{sql_parameter, ToolContext};

pub const NAME: &str = "query";

#[derive(Debug, Deserialize)]
struct Arguments {
    query: String,
}

/// Runs a query, shows the first rows in the transcript and returns every
/// row to the agent. Session state is never touched.
pub struct QueryTool {
    ctx: ToolContext,
    preview_max_rows: usize,
}

impl QueryTool {
    pub fn new(ctx: ToolContext, preview_max_rows: usize) -> Self {
        Self {
            ctx,
            preview_max_rows,
        }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Perform a SQL query on the data, and return the results as JSON."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": sql_parameter(self.ctx.source.as_ref()),
                },
            },
            "required": ["query"],
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: Arguments =
            serde_json::from_value(arguments).map_err(|e| ToolError::invalid_arguments(NAME, e))?;

        self.ctx.transcript.push_sql(&args.query);

        let result = match self.ctx.source.execute(&args.query) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Preview query failed");
                self.ctx.transcript.push_error(&e.to_string());
                return Err(e.into());
            }
        };

        debug!(rows = result.num_rows(), "Preview query succeeded");
        self.ctx
            .transcript
            .push_table(&render::table_to_html(&result, self.preview_max_rows));
        Ok(result.to_records())
    }
}
