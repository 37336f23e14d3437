//! The two tools exposed to the agent.
//!
//! `update_dashboard` commits a filter to the session; `query` previews a
//! result without touching session state. Both echo their SQL to the
//! transcript and report backend errors there before returning them.

pub mod query;
pub mod update_dashboard;

use std::sync::Arc;

use tabula_source::DataSource;

use crate::state::SessionState;
use crate::tool::ToolRegistry;
use crate::transcript::Transcript;

pub use query::QueryTool;
pub use update_dashboard::UpdateDashboardTool;

/// Session resources the tools operate on.
#[derive(Clone)]
pub struct ToolContext {
    pub source: Arc<dyn DataSource>,
    pub state: Arc<SessionState>,
    pub transcript: Arc<Transcript>,
}

/// Registry holding both session tools.
pub fn session_tools(ctx: ToolContext, preview_max_rows: usize) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(UpdateDashboardTool::new(ctx.clone())));
    registry.register(Arc::new(QueryTool::new(ctx, preview_max_rows)));
    registry
}

/// JSON Schema description of a SQL argument for this source's engine.
fn sql_parameter(source: &dyn DataSource) -> String {
    format!("A {} SQL query; must be a SELECT statement.", source.db_engine())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tabula_core::types::{Column, DataType, Table, Value};
    use tabula_source::InMemoryTable;

    /// 891 passengers, 342 of whom survived.
    pub fn titanic() -> Table {
        let rows = (0..891)
            .map(|i| {
                let survived = i64::from(i < 342);
                let class = 1 + (i % 3) as i64;
                let town = ["Southampton", "Cherbourg", "Queenstown"][(i % 3) as usize];
                vec![
                    Value::Integer(i as i64 + 1),
                    Value::Integer(survived),
                    Value::Integer(class),
                    Value::Text(town.to_string()),
                ]
            })
            .collect();
        Table::new(
            vec![
                Column::new("passenger_id", DataType::Integer),
                Column::new("survived", DataType::Integer),
                Column::new("pclass", DataType::Integer),
                Column::new("embark_town", DataType::Text),
            ],
            rows,
        )
        .unwrap()
    }

    pub fn context() -> ToolContext {
        ToolContext {
            source: Arc::new(InMemoryTable::new(titanic(), "titanic").unwrap()),
            state: Arc::new(SessionState::new()),
            transcript: Arc::new(Transcript::new()),
        }
    }
}
