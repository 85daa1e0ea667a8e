//! Team board - cards laid out in state columns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::cmp::Ordering;

use super::ReportError;
use crate::config::Config;
use crate::db::{self, CardFilter};
use crate::domain::{Card, StateBucket, StateSequence};
use crate::flow::DayCount;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub state: String,
    pub buffer: Option<String>,
    pub cards: Vec<Card>,
    pub buffer_cards: Vec<Card>,
}

impl BoardColumn {
    /// Buffer cards count toward the column they feed
    pub fn wip(&self) -> usize {
        self.cards.len() + self.buffer_cards.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub team: Option<String>,
    pub columns: Vec<BoardColumn>,
    /// Cards whose state is not on the board
    pub excluded: Vec<String>,
}

impl Board {
    /// Load every card for `team` (or all teams) and lay it out
    pub async fn load(
        pool: &SqlitePool,
        config: &Config,
        team: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Board, ReportError> {
        let states = config.state_sequence()?;
        let filter = match team {
            Some(team) => CardFilter::teams(vec![team.to_string()]),
            None => CardFilter::all(),
        };
        let cards = db::list_cards(pool, &filter, None).await?;

        Ok(Self::build(&states, team, cards, config.flow.day_count, now))
    }

    pub fn build(
        states: &StateSequence,
        team: Option<&str>,
        cards: Vec<Card>,
        day_count: DayCount,
        now: DateTime<Utc>,
    ) -> Board {
        let mut columns: Vec<BoardColumn> = states
            .active()
            .map(|state| BoardColumn {
                state: state.name.clone(),
                buffer: state.buffer.clone(),
                cards: Vec::new(),
                buffer_cards: Vec::new(),
            })
            .collect();
        let mut excluded = Vec::new();

        for card in cards {
            let primary = states.primary_for(&card.state).map(str::to_string);
            let column_state = primary.as_deref().unwrap_or(&card.state);
            let Some(column) = columns.iter_mut().find(|c| c.state == column_state) else {
                tracing::warn!(card = %card.key, "State '{}' is not on the board", card.state);
                excluded.push(card.key);
                continue;
            };
            if primary.is_some() {
                column.buffer_cards.push(card);
            } else {
                column.cards.push(card);
            }
        }

        for column in &mut columns {
            let Ok(bucket) = states.classify(&column.state) else {
                continue;
            };
            sort_cell(&mut column.cards, bucket, day_count, now);
            sort_cell(&mut column.buffer_cards, bucket, day_count, now);
        }

        Board {
            team: team.map(str::to_string),
            columns,
            excluded,
        }
    }

    pub fn column(&self, state: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.state == state)
    }
}

/// Order one board cell according to where the column sits in the flow
pub fn sort_cell(cards: &mut [Card], bucket: StateBucket, day_count: DayCount, now: DateTime<Utc>) {
    match bucket {
        StateBucket::PreStart => cards.sort_by(|a, b| {
            by_priority(a.priority, b.priority)
                .then_with(|| a.version.cmp(&b.version))
                .then_with(|| b.created_at.cmp(&a.created_at))
        }),
        StateBucket::InProgress => cards.sort_by_key(|card| {
            std::cmp::Reverse(card.current_cycle_time(day_count, now).unwrap_or(0))
        }),
        StateBucket::Done => cards.sort_by(|a, b| b.done_date.cmp(&a.done_date)),
    }
}

/// Set priorities first, lowest number first
fn by_priority(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateEntry;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 5, 10, 12, 0, 0).unwrap()
    }

    fn states() -> StateSequence {
        let entries = vec![
            StateEntry::Single("Backlog".into()),
            StateEntry::Single("Planning".into()),
            StateEntry::Buffered("Building".into(), "Build to Test".into()),
            StateEntry::Single("Testing".into()),
            StateEntry::Single("Done".into()),
        ];
        StateSequence::new(&entries, 0, 2, -1, &["Planning".into()]).unwrap()
    }

    #[test]
    fn test_columns_and_buffers() {
        let cards = vec![
            Card::new("B-1", now()).with_state("Building"),
            Card::new("B-2", now()).with_state("Build to Test"),
            Card::new("B-3", now()).with_state("Testing"),
            Card::new("B-4", now()).with_state("Mystery"),
        ];

        let board = Board::build(&states(), Some("Web"), cards, DayCount::Calendar, now());
        let names: Vec<&str> = board.columns.iter().map(|c| c.state.as_str()).collect();
        assert_eq!(names, vec!["Backlog", "Planning", "Building", "Testing", "Done"]);

        let building = board.column("Building").unwrap();
        assert_eq!(building.buffer.as_deref(), Some("Build to Test"));
        assert_eq!(building.cards.len(), 1);
        assert_eq!(building.buffer_cards.len(), 1);
        assert_eq!(building.wip(), 2);

        assert_eq!(board.excluded, vec!["B-4".to_string()]);
    }

    #[test]
    fn test_backlog_ordering() {
        let mut low = Card::new("P-1", now()).with_state("Backlog");
        low.priority = Some(5);
        let mut high = Card::new("P-2", now()).with_state("Backlog");
        high.priority = Some(1);
        let mut unranked_old = Card::new("P-3", now()).with_state("Backlog");
        unranked_old.created_at = now() - Duration::days(3);
        let unranked_new = Card::new("P-4", now()).with_state("Backlog");

        let board = Board::build(
            &states(),
            None,
            vec![unranked_old, low, unranked_new, high],
            DayCount::Calendar,
            now(),
        );
        let keys: Vec<&str> = board.column("Backlog").unwrap().cards.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["P-2", "P-1", "P-4", "P-3"]);
    }

    #[test]
    fn test_in_progress_longest_first() {
        let mut recent = Card::new("C-1", now()).with_state("Testing");
        recent.start_date = Some(now() - Duration::days(1));
        let mut old = Card::new("C-2", now()).with_state("Testing");
        old.start_date = Some(now() - Duration::days(9));

        let board = Board::build(&states(), None, vec![recent, old], DayCount::Calendar, now());
        let keys: Vec<&str> = board.column("Testing").unwrap().cards.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["C-2", "C-1"]);
    }
}
