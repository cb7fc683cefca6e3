//! Caller-owned statement cache with a TTL and an injectable clock

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::statement::FinancialStatement;

/// Source of the current time.
/// Abstracted for testing purposes.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CachedStatement {
    statement: FinancialStatement,
    inserted_at: DateTime<Utc>,
}

/// Fetched statements keyed by ticker. Entries older than the TTL are
/// treated as absent.
#[derive(Debug)]
pub struct StatementStore<C: Clock = SystemClock> {
    entries: HashMap<String, CachedStatement>,
    ttl: Duration,
    clock: C,
}

impl StatementStore<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> StatementStore<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    /// Store a statement under its ticker, replacing any previous entry.
    pub fn insert(&mut self, statement: FinancialStatement) {
        let inserted_at = self.clock.now();
        tracing::debug!(ticker = %statement.ticker, %inserted_at, "Caching statement");
        self.entries.insert(
            statement.ticker.clone(),
            CachedStatement {
                statement,
                inserted_at,
            },
        );
    }

    /// The cached statement, or `None` when absent or expired.
    pub fn get(&self, ticker: &str) -> Option<&FinancialStatement> {
        let now = self.clock.now();
        self.entries
            .get(ticker)
            .filter(|e| !self.is_expired(e, now))
            .map(|e| &e.statement)
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.inserted_at < ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired statements");
        }
        removed
    }

    pub fn invalidate(&mut self, ticker: &str) -> Option<FinancialStatement> {
        self.entries.remove(ticker).map(|e| e.statement)
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &CachedStatement, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at >= self.ttl
    }
}
