//! Per-state card counts captured once a day

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::group::ReportGroup;
use super::ReportError;
use crate::config::Config;
use crate::db;
use crate::domain::StateSequence;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCount {
    pub state: String,
    /// Every card in the state
    pub count: i64,
    /// Non-defect cards in the state
    pub card_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowReport {
    pub date: NaiveDate,
    pub group: String,
    /// In board order
    #[serde(default)]
    pub state_counts: Vec<StateCount>,
    pub updated_at: DateTime<Utc>,
}

impl FlowReport {
    /// Count cards per configured state for `group` and upsert the report dated `at`
    pub async fn capture(
        pool: &SqlitePool,
        config: &Config,
        group: &str,
        at: DateTime<Utc>,
    ) -> Result<FlowReport, ReportError> {
        let states = config.state_sequence()?;
        let filter = ReportGroup::resolve(config, group).filter();
        let rows = db::count_by_state_and_type(pool, &filter).await?;

        let mut state_counts: Vec<StateCount> = states
            .iter()
            .map(|state| StateCount {
                state: state.to_string(),
                count: 0,
                card_count: 0,
            })
            .collect();

        for (state, card_type, count) in rows {
            let Ok(index) = states.index_of(&state) else {
                tracing::warn!(
                    "{} card(s) in unknown state '{}' left out of the {} flow report",
                    count,
                    state,
                    group
                );
                continue;
            };
            let slot = &mut state_counts[index];
            slot.count += count;
            let is_defect = card_type
                .as_ref()
                .is_some_and(|t| config.defect_types.iter().any(|d| d == t));
            if !is_defect {
                slot.card_count += count;
            }
        }

        let report = FlowReport {
            date: at.date_naive(),
            group: group.to_string(),
            state_counts,
            updated_at: Utc::now(),
        };
        db::upsert_flow_report(pool, &report).await?;

        Ok(report)
    }

    pub async fn get(
        pool: &SqlitePool,
        date: NaiveDate,
        group: &str,
    ) -> Result<FlowReport, ReportError> {
        db::get_flow_report(pool, date, group)
            .await?
            .ok_or_else(|| ReportError::RecordNotFound {
                kind: "flow report",
                group: group.to_string(),
                date,
            })
    }

    pub fn count_for(&self, state: &str) -> i64 {
        self.state_counts
            .iter()
            .find(|c| c.state == state)
            .map_or(0, |c| c.count)
    }

    /// Cards between the start state and done, buffers included
    pub fn wip(&self, states: &StateSequence) -> i64 {
        states
            .in_progress()
            .iter()
            .map(|state| self.count_for(state))
            .sum()
    }
}
