//! Card tracker - saves cards and logs their state transitions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use super::history::{CloseOutcome, StateHistoryLog};
use super::locks::CardLocks;
use super::transitions::{SaveOutcome, Transition};
use crate::config::Config;
use crate::db;
use crate::domain::{Card, DomainError, ServiceClasses, StateSequence};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Card has no key")]
    MissingKey,

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Persists cards; a state change closes the old history interval and opens
/// a new one in the same transaction, under a per-card lock.
#[derive(Clone)]
pub struct CardTracker {
    pool: SqlitePool,
    config: Arc<Config>,
    states: Arc<StateSequence>,
    classes: Arc<ServiceClasses>,
    locks: CardLocks,
}

impl CardTracker {
    pub fn new(pool: SqlitePool, config: Arc<Config>) -> Result<Self, TrackerError> {
        let states = Arc::new(config.state_sequence()?);
        let classes = Arc::new(config.service_class_table());
        Ok(Self {
            pool,
            config,
            states,
            classes,
            locks: CardLocks::new(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn states(&self) -> &StateSequence {
        &self.states
    }

    pub fn service_classes(&self) -> &ServiceClasses {
        &self.classes
    }

    pub async fn get(&self, key: &str) -> Result<Card, TrackerError> {
        db::get_card_by_key(&self.pool, key)
            .await?
            .ok_or_else(|| TrackerError::CardNotFound(key.to_string()))
    }

    pub async fn save(&self, card: &mut Card) -> Result<SaveOutcome, TrackerError> {
        self.save_at(card, Utc::now()).await
    }

    /// Save with an explicit clock reading for the transition timestamps
    pub async fn save_at(
        &self,
        card: &mut Card,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, TrackerError> {
        card.normalize();
        if card.key.is_empty() {
            return Err(TrackerError::MissingKey);
        }

        let _guard = self.locks.lock(&card.key).await;
        let mut tx = self.pool.begin().await?;
        db::claim_write_lock(&mut *tx).await?;

        let stored = db::get_stored_state(&mut *tx, &card.key).await?;
        let old_state = match stored {
            Some((id, state)) => {
                card.id = id;
                Some(state)
            }
            None => None,
        };

        let mut outcome = SaveOutcome::new(card.id);
        outcome.unblocked = card.apply_auto_state_changes(
            &self.states,
            &self.config.state_assignee_rules,
            old_state.as_deref(),
            now,
        );
        card.refresh_cached_times(self.config.flow.day_count, now);

        if let Err(e) = self.states.classify(&card.state) {
            tracing::warn!(card = %card.key, "{}; card will be left out of board buckets", e);
        }

        let changing = old_state.as_deref() != Some(card.state.as_str());

        if changing {
            if let Some(old) = old_state.as_deref() {
                match StateHistoryLog::close_current(&mut *tx, &card.id, old, now).await? {
                    CloseOutcome::Closed(entries) => {
                        if entries.len() > 1 {
                            tracing::warn!(
                                card = %card.key,
                                state = old,
                                count = entries.len(),
                                "Closed duplicate open history entries"
                            );
                        }
                        outcome.closed = entries;
                    }
                    CloseOutcome::Missing => {
                        tracing::warn!(
                            card = %card.key,
                            state = old,
                            "No open history entry for the state being left"
                        );
                        outcome.missing_history = true;
                    }
                }
            }
            card.time_in_current_state = Some(0);
        } else {
            card.time_in_current_state = db::latest_entry(&mut *tx, &card.id, &card.state)
                .await?
                .map(|entry| entry.duration_at(now));
        }

        card.updated_at = now;
        db::upsert_card(&mut *tx, card).await?;

        if changing {
            let class = card.resolve_service_class(&self.classes);
            let opened =
                StateHistoryLog::open_new(&mut *tx, &card.id, &card.state, now, &class.name)
                    .await?;
            if opened.duplicates > 0 {
                tracing::warn!(
                    card = %card.key,
                    state = %card.state,
                    count = opened.duplicates + 1,
                    "Multiple open history entries, reusing the newest"
                );
            }
            outcome.duplicate_open_entries = opened.duplicates;
            outcome.opened = Some(opened.entry);
            outcome.transition = Some(Transition {
                from: old_state.clone(),
                to: card.state.clone(),
                at: now,
            });
        }

        tx.commit().await?;

        if let Some(transition) = &outcome.transition {
            tracing::debug!(
                card = %card.key,
                from = transition.from.as_deref().unwrap_or("-"),
                to = %transition.to,
                "Card changed state"
            );
        }

        Ok(outcome)
    }

    /// Remove a card and its history
    pub async fn delete(&self, key: &str) -> Result<(), TrackerError> {
        let card = self.get(key).await?;
        let _guard = self.locks.lock(&card.key).await;
        db::delete_card(&self.pool, &card.id.to_string()).await?;
        tracing::info!("Deleted card {}", card.key);
        Ok(())
    }
}
