//! Card domain model - a ticket mirrored onto the board

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::service_class::{GoalStatus, ServiceClass, ServiceClasses, DEFAULT_SERVICE_CLASS};
use super::states::StateSequence;
use super::ticket::TicketData;
use crate::config::Config;
use crate::flow::{hours_between, DayCount};

pub const DEFAULT_STATE: &str = "Unknown";

/// A period during which a card could not progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockerRecord {
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub unblocked_at: Option<DateTime<Utc>>,
}

impl BlockerRecord {
    /// Hours blocked, up to `now` while still open
    pub fn duration_at(&self, now: DateTime<Utc>) -> i64 {
        hours_between(self.blocked_at, self.unblocked_at.unwrap_or(now))
    }
}

/// A card on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub key: String,
    pub title: String,
    pub backlog_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub done_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub state: String,
    pub team: String,
    pub priority: Option<i32>,
    /// Raw class name; resolve through `ServiceClasses`
    pub service_class: Option<String>,
    pub card_type: Option<String>,
    pub assignee: Option<String>,
    pub version: Option<String>,
    pub blocked: bool,
    pub blocked_ever: bool,
    /// Hours spent blocked across all blockers
    pub blocked_time: Option<i64>,
    pub blockers: Vec<BlockerRecord>,
    /// Cached once both start and done dates are known
    pub cycle_time: Option<i64>,
    pub lead_time: Option<i64>,
    /// Hours in the current state as of the last save
    pub time_in_current_state: Option<i64>,
    pub worked_on: Vec<String>,
    pub ticket_system_data: Option<TicketData>,
    pub ticket_system_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(key: impl Into<String>, backlog_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            title: String::new(),
            backlog_date,
            start_date: None,
            done_date: None,
            due_date: None,
            state: DEFAULT_STATE.to_string(),
            team: String::new(),
            priority: None,
            service_class: None,
            card_type: None,
            assignee: None,
            version: None,
            blocked: false,
            blocked_ever: false,
            blocked_time: None,
            blockers: Vec::new(),
            cycle_time: None,
            lead_time: None,
            time_in_current_state: None,
            worked_on: Vec::new(),
            ticket_system_data: None,
            ticket_system_updated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_service_class(mut self, service_class: impl Into<String>) -> Self {
        self.service_class = Some(service_class.into());
        self
    }

    pub fn with_type(mut self, card_type: impl Into<String>) -> Self {
        self.card_type = Some(card_type.into());
        self
    }

    pub fn is_done(&self) -> bool {
        self.done_date.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.start_date.is_some()
    }

    pub fn block(&mut self, reason: impl Into<String>, blocked_at: DateTime<Utc>) {
        self.blockers.push(BlockerRecord {
            reason: reason.into(),
            blocked_at,
            unblocked_at: None,
        });
        self.blocked = true;
        self.blocked_ever = true;
    }

    /// Close every open blocker
    pub fn unblock(&mut self, unblocked_at: DateTime<Utc>) {
        self.blocked = false;
        for blocker in self.blockers.iter_mut().filter(|b| b.unblocked_at.is_none()) {
            blocker.unblocked_at = Some(unblocked_at);
        }
    }

    pub fn blocked_hours(&self, now: DateTime<Utc>) -> i64 {
        self.blockers.iter().map(|b| b.duration_at(now)).sum()
    }

    /// Days from start to done; undefined until done
    pub fn cycle_time_with(&self, day_count: DayCount) -> Option<i64> {
        match (self.start_date, self.done_date) {
            (Some(start), Some(done)) => Some(day_count.between(start, done)),
            _ => None,
        }
    }

    /// Days from backlog to done; undefined until done
    pub fn lead_time_with(&self, day_count: DayCount) -> Option<i64> {
        self.done_date
            .map(|done| day_count.between(self.backlog_date, done))
    }

    /// Days since start, up to `today` or the done date
    pub fn current_cycle_time(&self, day_count: DayCount, today: DateTime<Utc>) -> Option<i64> {
        let start = self.start_date?;
        Some(day_count.between(start, self.done_date.unwrap_or(today)))
    }

    /// Days since entering the backlog, up to `today` or the done date
    pub fn current_lead_time(&self, day_count: DayCount, today: DateTime<Utc>) -> i64 {
        day_count.between(self.backlog_date, self.done_date.unwrap_or(today))
    }

    pub fn service_class_name(&self) -> &str {
        self.service_class.as_deref().unwrap_or(DEFAULT_SERVICE_CLASS)
    }

    pub fn resolve_service_class(&self, classes: &ServiceClasses) -> ServiceClass {
        classes.resolve(self.service_class.as_deref())
    }

    /// Current cycle time against the class goal; unstarted cards count as zero days
    pub fn cycle_vs_goal(
        &self,
        classes: &ServiceClasses,
        day_count: DayCount,
        today: DateTime<Utc>,
    ) -> GoalStatus {
        let current = self.current_cycle_time(day_count, today).unwrap_or(0);
        self.resolve_service_class(classes).goal_status(current)
    }

    /// False for defect types
    pub fn is_card(&self, defect_types: &[String]) -> bool {
        match &self.card_type {
            Some(t) => !defect_types.iter().any(|d| d == t),
            None => true,
        }
    }

    /// Copy ticket fields onto the card and keep the raw payload
    pub fn apply_ticket_data(&mut self, data: TicketData, config: &Config, fetched_at: DateTime<Utc>) {
        let card_type = data
            .ticket_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(config.default_type.as_str());
        self.card_type = Some(card_type.to_string());

        self.title = data.summary.clone().unwrap_or_default();
        self.assignee = data.assignee.clone();
        self.version = data.version.clone();
        if let Some(class) = data.service_class.as_ref().filter(|c| !c.is_empty()) {
            self.service_class = Some(class.clone());
        }
        if data.due_date.is_some() {
            self.due_date = data.due_date;
        }
        if let Some(state) = data
            .status
            .as_ref()
            .and_then(|status| config.status_mapping.get(status))
        {
            self.state = state.clone();
        }

        self.worked_on = data.people();
        self.ticket_system_data = Some(data);
        self.ticket_system_updated_at = Some(fetched_at);
    }

    /// Rules applied on every save, given the state persisted before it.
    ///
    /// Returns true when an open blocker was closed.
    pub fn apply_auto_state_changes(
        &mut self,
        states: &StateSequence,
        assignee_rules: &HashMap<String, HashMap<String, String>>,
        old_state: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.done_date.is_some() {
            self.state = states.done().to_string();
        }

        if let Some(target) = self
            .assignee
            .as_ref()
            .and_then(|assignee| assignee_rules.get(&self.state)?.get(assignee))
        {
            self.state = target.clone();
        }

        let mut unblocked = false;
        if self.blocked {
            if let Some(old) = old_state {
                if old != self.state {
                    self.unblock(now);
                    unblocked = true;
                }
            }
        }

        if !states.is_orderable(&self.state) {
            self.priority = None;
        }

        unblocked
    }

    /// Recompute cached cycle/lead/blocked times
    pub fn refresh_cached_times(&mut self, day_count: DayCount, now: DateTime<Utc>) {
        if self.start_date.is_some() && self.done_date.is_some() {
            self.cycle_time = self.cycle_time_with(day_count);
            self.lead_time = self.lead_time_with(day_count);
        }
        if self.blocked_ever {
            self.blocked_time = Some(self.blocked_hours(now));
        }
    }

    /// Canonical key and trimmed type
    pub fn normalize(&mut self) {
        self.key = self.key.trim().to_uppercase();
        if let Some(card_type) = self.card_type.as_mut() {
            *card_type = card_type.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceClassConfig, StateEntry};
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 1, d, 12, 0, 0).unwrap()
    }

    fn states() -> StateSequence {
        let entries: Vec<StateEntry> = ["Todo", "Doing", "Done"]
            .iter()
            .map(|s| StateEntry::Single(s.to_string()))
            .collect();
        StateSequence::new(&entries, 0, 1, -1, &[]).unwrap()
    }

    #[test]
    fn test_card_new() {
        let card = Card::new("cmsiphone-100", day(1));
        assert_eq!(card.state, DEFAULT_STATE);
        assert!(card.blockers.is_empty());
        assert!(card.cycle_time.is_none());
        assert!(!card.is_done());
    }

    #[test]
    fn test_cycle_and_lead_time() {
        let mut card = Card::new("CMSIPHONE-1", day(1));
        card.start_date = Some(day(3));
        assert_eq!(card.cycle_time_with(DayCount::Calendar), None);
        assert_eq!(card.lead_time_with(DayCount::Calendar), None);
        assert_eq!(card.current_cycle_time(DayCount::Calendar, day(5)), Some(2));
        assert_eq!(card.current_lead_time(DayCount::Calendar, day(5)), 4);

        card.done_date = Some(day(10));
        assert_eq!(card.cycle_time_with(DayCount::Calendar), Some(7));
        assert_eq!(card.lead_time_with(DayCount::Calendar), Some(9));
        // done cards stop the clock
        assert_eq!(card.current_cycle_time(DayCount::Calendar, day(20)), Some(7));
    }

    #[test]
    fn test_block_and_unblock() {
        let mut card = Card::new("CMSIPHONE-2", day(1));
        card.block("Waiting on legal", day(2));
        assert!(card.blocked);
        assert!(card.blocked_ever);

        card.unblock(day(4));
        assert!(!card.blocked);
        assert!(card.blocked_ever);
        assert_eq!(card.blockers[0].unblocked_at, Some(day(4)));
        assert_eq!(card.blocked_hours(day(30)), 48);

        card.block("Again", day(5));
        card.refresh_cached_times(DayCount::Calendar, day(5) + Duration::hours(6));
        assert_eq!(card.blocked_time, Some(54));
    }

    #[test]
    fn test_done_date_forces_done_state() {
        let mut card = Card::new("CMSIPHONE-3", day(1)).with_state("Doing");
        card.start_date = Some(day(2));
        card.done_date = Some(day(4));

        card.apply_auto_state_changes(&states(), &HashMap::new(), Some("Doing"), day(4));
        assert_eq!(card.state, "Done");
    }

    #[test]
    fn test_state_change_unblocks() {
        let mut card = Card::new("CMSIPHONE-4", day(1)).with_state("Doing");
        card.block("Env down", day(2));

        let unblocked =
            card.apply_auto_state_changes(&states(), &HashMap::new(), Some("Doing"), day(3));
        assert!(!unblocked);
        assert!(card.blocked);

        card.state = "Done".into();
        let unblocked =
            card.apply_auto_state_changes(&states(), &HashMap::new(), Some("Doing"), day(3));
        assert!(unblocked);
        assert!(!card.blocked);
        assert_eq!(card.blockers[0].unblocked_at, Some(day(3)));
    }

    #[test]
    fn test_assignee_rules_and_priority() {
        let mut rules = HashMap::new();
        rules.insert(
            "Doing".to_string(),
            HashMap::from([("qa-bot".to_string(), "Done".to_string())]),
        );

        let mut card = Card::new("CMSIPHONE-5", day(1)).with_state("Doing");
        card.assignee = Some("qa-bot".into());
        card.priority = Some(3);

        card.apply_auto_state_changes(&states(), &rules, Some("Doing"), day(2));
        assert_eq!(card.state, "Done");
        assert_eq!(card.priority, None);

        let mut backlog = Card::new("CMSIPHONE-6", day(1)).with_state("Todo");
        backlog.priority = Some(1);
        backlog.apply_auto_state_changes(&states(), &rules, None, day(2));
        assert_eq!(backlog.priority, Some(1));
    }

    #[test]
    fn test_cycle_vs_goal() {
        let mut config = HashMap::new();
        config.insert(
            "Expedite".to_string(),
            ServiceClassConfig {
                lower: Some(1),
                upper: Some(3),
                wip: None,
            },
        );
        let classes = ServiceClasses::from_config(&config);

        let mut card = Card::new("CMSIPHONE-7", day(1)).with_service_class("Expedite");
        card.start_date = Some(day(2));

        assert_eq!(card.cycle_vs_goal(&classes, DayCount::Calendar, day(2)).as_i8(), -1);
        assert_eq!(card.cycle_vs_goal(&classes, DayCount::Calendar, day(4)).as_i8(), 0);
        assert_eq!(card.cycle_vs_goal(&classes, DayCount::Calendar, day(6)).as_i8(), 1);
        assert_eq!(card.cycle_vs_goal(&classes, DayCount::Calendar, day(8)).as_i8(), 2);

        let plain = Card::new("CMSIPHONE-8", day(1));
        assert_eq!(plain.cycle_vs_goal(&classes, DayCount::Calendar, day(9)), GoalStatus::Within);
    }

    #[test]
    fn test_apply_ticket_data() {
        let mut config = Config::default();
        config.default_type = "Story".into();
        config
            .status_mapping
            .insert("In Review".into(), "Doing".into());

        let mut card = Card::new("cmsiphone-9", day(1)).with_state("Todo");
        let data = TicketData {
            summary: Some("Add login".into()),
            status: Some("In Review".into()),
            service_class: Some("Expedite".into()),
            assignee: Some("alice".into()),
            developers: vec!["bob".into()],
            ..Default::default()
        };

        card.apply_ticket_data(data, &config, day(3));
        card.normalize();

        assert_eq!(card.key, "CMSIPHONE-9");
        assert_eq!(card.title, "Add login");
        assert_eq!(card.state, "Doing");
        assert_eq!(card.card_type.as_deref(), Some("Story"));
        assert_eq!(card.service_class.as_deref(), Some("Expedite"));
        assert_eq!(card.worked_on, vec!["alice", "bob"]);
        assert_eq!(card.ticket_system_updated_at, Some(day(3)));
    }

    #[test]
    fn test_is_card() {
        let defects = vec!["Bug".to_string(), "Defect".to_string()];
        assert!(Card::new("A-1", day(1)).is_card(&defects));
        assert!(Card::new("A-2", day(1)).with_type("Story").is_card(&defects));
        assert!(!Card::new("A-3", day(1)).with_type("Bug").is_card(&defects));
    }

    #[test]
    fn test_card_serialization() {
        let card = Card::new("A-1", day(1));
        let json = serde_json::to_value(&card).unwrap();
        assert!(json.get("backlogDate").is_some());
        assert!(json.get("ticketSystemData").is_some());
        assert!(json.get("backlog_date").is_none());
    }
}
