//! Workflow state sequence

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use super::error::DomainError;
use crate::config::{StateEntry, StatesConfig};

/// A single column on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub name: String,
    /// Buffer column that queues work for this state
    pub buffer: Option<String>,
    pub is_buffer: bool,
}

/// Where a state sits relative to the start and done markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBucket {
    PreStart,
    InProgress,
    Done,
}

impl std::fmt::Display for StateBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateBucket::PreStart => write!(f, "pre_start"),
            StateBucket::InProgress => write!(f, "in_progress"),
            StateBucket::Done => write!(f, "done"),
        }
    }
}

/// Ordered, validated list of workflow states.
///
/// Buffer entries are expanded in place: `["Building", "Ready: Testing"]`
/// becomes the two columns `Building`, `Ready: Testing`, in that order.
#[derive(Debug, Clone)]
pub struct StateSequence {
    states: Vec<State>,
    backlog: usize,
    start: usize,
    done: usize,
    pre_start: Vec<String>,
    in_progress: Vec<String>,
    orderable: Vec<String>,
    slugs: HashMap<String, String>,
}

impl StateSequence {
    pub fn from_config(config: &StatesConfig) -> Result<Self, DomainError> {
        Self::new(
            &config.card_states,
            config.backlog_state,
            config.start_state,
            config.done_state,
            &config.funnel_states,
        )
    }

    pub fn new(
        entries: &[StateEntry],
        backlog: i32,
        start: i32,
        done: i32,
        funnel_states: &[String],
    ) -> Result<Self, DomainError> {
        let mut states = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                StateEntry::Single(name) => states.push(State {
                    name: name.clone(),
                    buffer: None,
                    is_buffer: false,
                }),
                StateEntry::Buffered(name, buffer) => {
                    states.push(State {
                        name: name.clone(),
                        buffer: Some(buffer.clone()),
                        is_buffer: false,
                    });
                    states.push(State {
                        name: buffer.clone(),
                        buffer: None,
                        is_buffer: true,
                    });
                }
            }
        }

        if states.is_empty() {
            return Err(DomainError::InvalidStates("no card states configured".into()));
        }

        let mut seen = HashSet::new();
        for state in &states {
            if !seen.insert(state.name.as_str()) {
                return Err(DomainError::InvalidStates(format!(
                    "duplicate state name: {}",
                    state.name
                )));
            }
        }

        let backlog = resolve_index(backlog, states.len(), "backlog")?;
        let start = resolve_index(start, states.len(), "start")?;
        let done = resolve_index(done, states.len(), "done")?;

        if !(backlog < start && start < done) {
            return Err(DomainError::InvalidStates(format!(
                "expected backlog < start < done, got {} / {} / {}",
                states[backlog].name, states[start].name, states[done].name
            )));
        }

        let pre_start = states[..start].iter().map(|s| s.name.clone()).collect();
        let in_progress = states[backlog + 1..done]
            .iter()
            .map(|s| s.name.clone())
            .collect();

        let mut orderable = vec![states[backlog].name.clone()];
        for state in &states {
            if funnel_states.contains(&state.name) && !orderable.contains(&state.name) {
                orderable.push(state.name.clone());
            }
        }

        let slugs = states
            .iter()
            .map(|s| (slugify(&s.name), s.name.clone()))
            .collect();

        Ok(Self {
            states,
            backlog,
            start,
            done,
            pre_start,
            in_progress,
            orderable,
            slugs,
        })
    }

    /// State names in board order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.states.get(index).map(|s| s.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.iter().any(|s| s.name == name)
    }

    pub fn index_of(&self, name: &str) -> Result<usize, DomainError> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| DomainError::StateNotFound(name.to_string()))
    }

    pub fn backlog(&self) -> &str {
        &self.states[self.backlog].name
    }

    pub fn start(&self) -> &str {
        &self.states[self.start].name
    }

    pub fn done(&self) -> &str {
        &self.states[self.done].name
    }

    /// States before the start marker
    pub fn pre_start(&self) -> &[String] {
        &self.pre_start
    }

    /// States strictly between backlog and done
    pub fn in_progress(&self) -> &[String] {
        &self.in_progress
    }

    /// States whose cards carry a priority
    pub fn orderable(&self) -> &[String] {
        &self.orderable
    }

    pub fn is_orderable(&self, name: &str) -> bool {
        self.orderable.iter().any(|s| s == name)
    }

    /// Non-buffer states, i.e. the board's primary columns
    pub fn active(&self) -> impl Iterator<Item = &State> {
        self.states.iter().filter(|s| !s.is_buffer)
    }

    pub fn buffer_for(&self, primary: &str) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.name == primary)
            .and_then(|s| s.buffer.as_deref())
    }

    /// Primary state a buffer feeds, if `name` is a buffer
    pub fn primary_for(&self, name: &str) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.buffer.as_deref() == Some(name))
            .map(|s| s.name.as_str())
    }

    pub fn find_by_slug(&self, slug: &str) -> Result<&str, DomainError> {
        self.slugs
            .get(slug)
            .map(|s| s.as_str())
            .ok_or_else(|| DomainError::SlugNotFound(slug.to_string()))
    }

    /// Bucket a state name by the start and done markers
    pub fn classify(&self, name: &str) -> Result<StateBucket, DomainError> {
        let index = self.index_of(name)?;
        Ok(if index < self.start {
            StateBucket::PreStart
        } else if index >= self.done {
            StateBucket::Done
        } else {
            StateBucket::InProgress
        })
    }
}

fn resolve_index(index: i32, len: usize, marker: &str) -> Result<usize, DomainError> {
    let len = len as i64;
    let index = index as i64;
    let resolved = if index < 0 { len + index } else { index };

    if resolved < 0 || resolved >= len {
        return Err(DomainError::InvalidStates(format!(
            "{} index {} out of range for {} states",
            marker, index, len
        )));
    }
    Ok(resolved as usize)
}

/// URL-safe form of a state name: `Ready: Testing` -> `ready-testing`
pub fn slugify(name: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    static DASHES: OnceLock<Regex> = OnceLock::new();

    let strip = STRIP.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid slug regex"));
    let dashes = DASHES.get_or_init(|| Regex::new(r"[-\s]+").expect("valid slug regex"));

    let lowered = name.trim().to_lowercase();
    let stripped = strip.replace_all(&lowered, "");
    dashes.replace_all(stripped.trim(), "-").into_owned()
}
