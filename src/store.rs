//! External collaborators: questions, scores, and identity
//!
//! The lobby core never talks to a database or validates credentials; it
//! consumes these narrow traits instead. The in-memory implementations here
//! back the tests and small deployments: a question corpus sampled at
//! random, and account rows holding display name and durable point total,
//! addressable by session token.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{events::LeaderboardEntry, registry::Id};

/// One question of the corpus
///
/// Immutable and sourced externally; the active round references it
/// read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Corpus identifier of the question
    pub id: u64,
    /// The prompt shown to participants
    pub prompt: String,
    /// The correct answer, never broadcast before settlement
    pub answer: String,
    /// Where the question comes from, when known
    pub source: Option<String>,
}

/// Supplies a random question for a new round
pub trait QuestionSource {
    /// Picks a random question, or `None` if the corpus is exhausted
    fn random_question(&self) -> Option<QuestionRecord>;
}

/// Durable per-account point total
///
/// Writes happen only inside round settlement and only increase a total.
pub trait ScoreStore {
    /// Adds points to an account and returns the new total
    fn award(&mut self, id: Id, points: u64) -> u64;

    /// The top accounts by point total, ranked starting at 1
    fn top(&self, limit: usize) -> Vec<LeaderboardEntry>;
}

/// A resolved participant identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable account identifier
    pub id: Id,
    /// Display name
    pub name: String,
    /// Current durable point total
    pub points: u64,
}

/// Maps opaque session tokens to participant identities
///
/// Credential issuance and storage live entirely behind this trait; the
/// lobby only consumes the resolved identity.
pub trait TokenResolver {
    /// Resolves a token, or `None` if it matches no live session
    fn resolve(&self, token: &str) -> Option<Identity>;
}

/// In-memory question corpus with random selection
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<QuestionRecord>,
}

impl QuestionBank {
    /// Creates a bank over the given questions
    pub fn new(questions: Vec<QuestionRecord>) -> Self {
        Self { questions }
    }

    /// Number of questions in the corpus
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the corpus is empty
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionSource for QuestionBank {
    fn random_question(&self) -> Option<QuestionRecord> {
        if self.questions.is_empty() {
            return None;
        }
        self.questions
            .get(fastrand::usize(..self.questions.len()))
            .cloned()
    }
}

/// One account row of the in-memory store
#[derive(Debug, Clone)]
struct Account {
    name: String,
    points: u64,
}

/// In-memory account store: token table plus point totals
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: HashMap<Id, Account>,
    tokens: HashMap<String, Id>,
}

impl MemoryAccounts {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an account with zero points, reachable under the given token
    ///
    /// # Returns
    ///
    /// The stable identifier of the new account
    pub fn insert(&mut self, token: &str, name: &str) -> Id {
        let id = Id::new();
        self.accounts.insert(
            id,
            Account {
                name: name.to_owned(),
                points: 0,
            },
        );
        self.tokens.insert(token.to_owned(), id);
        id
    }

    /// Current point total of an account, zero if unknown
    pub fn points(&self, id: Id) -> u64 {
        self.accounts.get(&id).map_or(0, |account| account.points)
    }
}

impl TokenResolver for MemoryAccounts {
    fn resolve(&self, token: &str) -> Option<Identity> {
        let id = *self.tokens.get(token)?;
        let account = self.accounts.get(&id)?;
        Some(Identity {
            id,
            name: account.name.clone(),
            points: account.points,
        })
    }
}

impl ScoreStore for MemoryAccounts {
    fn award(&mut self, id: Id, points: u64) -> u64 {
        match self.accounts.get_mut(&id) {
            Some(account) => {
                account.points += points;
                account.points
            }
            None => 0,
        }
    }

    fn top(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.accounts
            .values()
            .sorted_by(|a, b| b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name)))
            .take(limit)
            .enumerate()
            .map(|(index, account)| LeaderboardEntry {
                rank: index + 1,
                name: account.name.clone(),
                points: account.points,
            })
            .collect()
    }
}
