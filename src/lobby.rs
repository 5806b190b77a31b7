//! Core round engine and session state
//!
//! This module owns the live session: the round lifecycle state machine, the
//! active question, answer tallying, and settlement. The hosting layer
//! serializes all participant commands and timer expiries onto one `Lobby`
//! value (an actor-style event loop or a single mutex around it), so the
//! engine itself is plain single-threaded state.
//!
//! Timers are not owned here either: the lobby hands [`AlarmMessage`]s and
//! delays to a `schedule` callback and the host feeds them back through
//! [`Lobby::receive_alarm`] when they expire. Every alarm carries the round
//! number it was armed for, and stale alarms are ignored, so arming a new
//! round implicitly cancels the previous round's timer and the race between
//! "timer fired" and "everyone answered" collapses into whichever caller
//! wins the single `Active -> Settling` transition.

use std::{collections::HashMap, time::Duration};

use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;
use web_time::SystemTime;

use super::{
    config::LobbyConfig,
    constants,
    events::{
        AlarmMessage, AnswerResult, CurrentRound, LeaveReason, PlayerEntry, SyncMessage,
        UpdateMessage,
    },
    registry::{self, Id, Participant, Registry},
    session::{Broadcaster, ConnectionId, Tunnel},
    store::{Identity, QuestionRecord, QuestionSource, ScoreStore, TokenResolver},
};

/// Why an answer submission was rejected
///
/// All rejections are local and recoverable; they are reported to the
/// submitting connection only and change no state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnswerError {
    /// No round is accepting answers right now
    #[error("no round is currently running")]
    NotActive,
    /// The participant joined mid-round, or is not registered at all
    #[error("you joined while the round was in progress")]
    NotEligible,
    /// An answer was already accepted from this participant this round
    #[error("you already answered this round")]
    AlreadyAnswered,
}

/// One question/answer cycle
#[derive(Debug)]
pub struct Round {
    /// Monotonically increasing round number, starting at 1
    number: u64,
    /// The question being asked, referenced read-only
    question: QuestionRecord,
    /// First accepted answer per eligible participant
    answers: HashMap<Id, String>,
    /// When the answering window opened
    started: SystemTime,
}

impl Round {
    /// The round's number
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Time left in the answering window, saturating at zero
    fn remaining(&self, limit: Duration) -> Duration {
        limit.saturating_sub(self.started.elapsed().unwrap_or_default())
    }
}

/// The phase the session is currently in
///
/// At most one round is active at any instant. Settlement is not a resting
/// state: it is the one-shot transition out of [`State::Active`], after
/// which the session is either pausing before the next round or idle until
/// someone joins.
#[derive(Debug, Default)]
pub enum State {
    /// No round is running and none is scheduled
    #[default]
    Idle,
    /// A question is live and answers race the deadline
    Active(Round),
    /// A round settled; the next one starts when the intermission elapses
    Intermission {
        /// Number of the round that just settled
        last_round: u64,
    },
}

/// Commands accepted from connected clients
///
/// Every command except [`IncomingMessage::RequestLeaderboard`] carries the
/// opaque session token; the lobby never validates credentials itself, it
/// only consumes the identity the external resolver maps the token to.
#[derive(Debug, Clone, Deserialize)]
pub enum IncomingMessage {
    /// Join the shared session
    Join {
        /// Opaque session token
        token: String,
    },
    /// Leave the shared session deliberately
    Leave {
        /// Opaque session token
        token: String,
        /// Why the client is leaving
        reason: LeaveReason,
    },
    /// Submit an answer for the current round
    SubmitAnswer {
        /// Opaque session token
        token: String,
        /// The chosen answer
        choice: String,
    },
    /// Ask for the current question's source reference
    RequestSource {
        /// Opaque session token
        token: String,
    },
    /// Ask for the global leaderboard
    RequestLeaderboard,
}

/// The shared live trivia session
///
/// Explicitly constructed and explicitly owned: the hosting transport layer
/// creates one `Lobby` and drives it; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct Lobby {
    /// Timing and scoring configuration
    config: LobbyConfig,
    /// Currently connected participants
    registry: Registry,
    /// Current phase of the session
    state: State,
    /// Number of the most recently started round
    round_counter: u64,
    /// Source reference of the active or most recently settled round
    current_source: Option<String>,
}

impl Lobby {
    /// Creates an idle lobby with the given configuration
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The session's current phase
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Whether a round is accepting answers right now
    pub fn round_active(&self) -> bool {
        matches!(self.state, State::Active(_))
    }

    /// Stable-ordered snapshot of the registered participants
    pub fn participants(&self) -> Vec<PlayerEntry> {
        self.registry.list()
    }

    /// Handles one client command
    ///
    /// This is the single entry point hosts use for participant-originated
    /// traffic. Rejections are sent back to the originating connection as
    /// `Error` events and never propagate further.
    ///
    /// # Arguments
    ///
    /// * `connection` - Handle of the connection the command arrived on
    /// * `message` - The command to process
    /// * `accounts` - Token resolution and durable score backend
    /// * `questions` - Question corpus for round starts
    /// * `broadcaster` - Fan-out to the active connections
    /// * `schedule` - Callback arming timers that feed [`Lobby::receive_alarm`]
    pub fn receive_message<T, A, Q, S>(
        &mut self,
        connection: ConnectionId,
        message: IncomingMessage,
        accounts: &mut A,
        questions: &Q,
        broadcaster: &mut Broadcaster<T>,
        mut schedule: S,
    ) where
        T: Tunnel,
        A: TokenResolver + ScoreStore,
        Q: QuestionSource,
        S: FnMut(AlarmMessage, Duration),
    {
        match message {
            IncomingMessage::Join { token } => {
                let Some(identity) = accounts.resolve(&token) else {
                    debug!("join rejected: unresolvable session token");
                    Self::reject(broadcaster, connection, "invalid session");
                    return;
                };
                if let Err(error) = self.join(
                    identity,
                    connection,
                    questions,
                    broadcaster,
                    &mut schedule,
                ) {
                    Self::reject(broadcaster, connection, &error.to_string());
                }
            }
            IncomingMessage::Leave { token, reason } => {
                let Some(identity) = accounts.resolve(&token) else {
                    Self::reject(broadcaster, connection, "invalid session");
                    return;
                };
                // Leaving twice is harmless.
                let _ = self.leave(identity.id, reason, broadcaster);
            }
            IncomingMessage::SubmitAnswer { token, choice } => {
                let Some(identity) = accounts.resolve(&token) else {
                    Self::reject(broadcaster, connection, "invalid session");
                    return;
                };
                if let Err(error) =
                    self.submit_answer(identity.id, choice, accounts, broadcaster, &mut schedule)
                {
                    debug!("answer from {} rejected: {error}", identity.name);
                    Self::reject(broadcaster, connection, &error.to_string());
                }
            }
            IncomingMessage::RequestSource { token } => {
                let Some(identity) = accounts.resolve(&token) else {
                    Self::reject(broadcaster, connection, "invalid session");
                    return;
                };
                match self.request_source(identity.id) {
                    Some(source) => broadcaster.send_to_one(
                        connection,
                        &UpdateMessage::SourceResponse {
                            source: source.to_owned(),
                        },
                    ),
                    None => Self::reject(
                        broadcaster,
                        connection,
                        "source is only available after answering",
                    ),
                }
            }
            IncomingMessage::RequestLeaderboard => {
                broadcaster.send_to_one(
                    connection,
                    &UpdateMessage::LeaderboardUpdate {
                        entries: accounts.top(constants::leaderboard::TOP_LIMIT),
                    },
                );
            }
        }
    }

    /// Handles an expired timer
    ///
    /// A round timeout funnels into the same settlement path as the last
    /// eligible answer; an intermission expiry starts the next round. Alarms
    /// armed for a round that is no longer current are ignored.
    pub fn receive_alarm<T, Q, SS, S>(
        &mut self,
        alarm: AlarmMessage,
        questions: &Q,
        scores: &mut SS,
        broadcaster: &Broadcaster<T>,
        mut schedule: S,
    ) where
        T: Tunnel,
        Q: QuestionSource,
        SS: ScoreStore,
        S: FnMut(AlarmMessage, Duration),
    {
        match alarm {
            AlarmMessage::RoundTimeout { round } => {
                if matches!(&self.state, State::Active(active) if active.number == round) {
                    info!("round {round} timed out");
                    self.settle(scores, broadcaster, &mut schedule);
                }
            }
            AlarmMessage::IntermissionOver { round } => {
                if matches!(self.state, State::Intermission { last_round } if last_round == round)
                {
                    self.start_round(questions, broadcaster, &mut schedule);
                }
            }
        }
    }

    /// Admits a resolved participant into the session
    ///
    /// Re-joining with an identity that is already registered replaces the
    /// prior entry and closes its stale connection. The joiner gets a
    /// [`SyncMessage::JoinSuccess`] snapshot (including the live round, if
    /// any), everyone else learns about the join, and a fresh round is
    /// started when the session is idle.
    ///
    /// # Errors
    ///
    /// Returns [`registry::Error::MaximumPlayers`] when the session is full.
    pub fn join<T, Q, S>(
        &mut self,
        identity: Identity,
        connection: ConnectionId,
        questions: &Q,
        broadcaster: &mut Broadcaster<T>,
        mut schedule: S,
    ) -> Result<(), registry::Error>
    where
        T: Tunnel,
        Q: QuestionSource,
        S: FnMut(AlarmMessage, Duration),
    {
        let Identity { id, name, points } = identity;

        let replaced = self.registry.register(
            id,
            name.clone(),
            connection,
            points,
            self.round_active(),
        )?;

        if let Some(stale) = replaced {
            // Reconnect: the replaced entry's pending answer no longer counts.
            if let State::Active(round) = &mut self.state {
                round.answers.remove(&id);
            }
            broadcaster.detach(stale);
        }

        info!("{name} joined the lobby");

        broadcaster.send_to_all(
            &UpdateMessage::PlayerJoined { name: name.clone() },
            Some(connection),
        );
        self.broadcast_player_list(broadcaster);

        let round = match &self.state {
            State::Active(active) => Some(CurrentRound {
                round_number: active.number,
                prompt: active.question.prompt.clone(),
                remaining: active.remaining(self.config.round_duration),
            }),
            _ => None,
        };
        broadcaster.send_state_to(
            connection,
            &SyncMessage::JoinSuccess {
                players: self.registry.list(),
                your_name: name,
                round,
            },
        );

        if matches!(self.state, State::Idle) {
            self.start_round(questions, broadcaster, &mut schedule);
        }

        Ok(())
    }

    /// Removes a participant who asked to leave
    ///
    /// An active round keeps running and is settled by its timer even if
    /// this was the last participant; only an empty intermission is
    /// collapsed back to idle so no next round gets scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`registry::Error::NotFound`] if the participant is not
    /// registered.
    pub fn leave<T: Tunnel>(
        &mut self,
        id: Id,
        reason: LeaveReason,
        broadcaster: &mut Broadcaster<T>,
    ) -> Result<String, registry::Error> {
        let participant = self.registry.unregister(id)?;
        let name = participant.name.clone();
        self.remove_participant(participant, reason, broadcaster);
        Ok(name)
    }

    /// Handles a transport-level connection loss
    ///
    /// Treated as a normal leave with [`LeaveReason::Disconnect`]; a closed
    /// connection that never joined is simply detached.
    pub fn connection_closed<T: Tunnel>(
        &mut self,
        connection: ConnectionId,
        broadcaster: &mut Broadcaster<T>,
    ) {
        match self.registry.unregister_connection(connection) {
            Ok(participant) => {
                self.remove_participant(participant, LeaveReason::Disconnect, broadcaster);
            }
            Err(registry::Error::NotFound) => broadcaster.detach(connection),
            Err(_) => {}
        }
    }

    /// Records an answer for the current round
    ///
    /// The first accepted answer per participant is authoritative; repeats
    /// are rejected, never overwritten. When every eligible participant has
    /// answered, the round settles immediately instead of waiting for the
    /// timeout.
    ///
    /// # Errors
    ///
    /// * [`AnswerError::NotActive`] - no round is accepting answers
    /// * [`AnswerError::NotEligible`] - the participant joined mid-round or
    ///   is not registered
    /// * [`AnswerError::AlreadyAnswered`] - an answer was already accepted
    pub fn submit_answer<T, SS, S>(
        &mut self,
        id: Id,
        choice: String,
        scores: &mut SS,
        broadcaster: &Broadcaster<T>,
        mut schedule: S,
    ) -> Result<(), AnswerError>
    where
        T: Tunnel,
        SS: ScoreStore,
        S: FnMut(AlarmMessage, Duration),
    {
        let State::Active(round) = &mut self.state else {
            return Err(AnswerError::NotActive);
        };
        let Some(participant) = self.registry.get_mut(id) else {
            return Err(AnswerError::NotEligible);
        };
        if !participant.eligible {
            return Err(AnswerError::NotEligible);
        }
        if participant.has_answered {
            return Err(AnswerError::AlreadyAnswered);
        }

        round.answers.insert(id, choice.clone());
        participant.has_answered = true;
        let name = participant.name.clone();
        let connection = participant.connection;
        debug!("{name} answered round {}", round.number);

        broadcaster.send_to_one(connection, &UpdateMessage::AnswerAccepted { choice });
        broadcaster.send_to_all(&UpdateMessage::PlayerAnswered { name }, Some(connection));
        self.broadcast_player_list(broadcaster);

        if self.registry.all_eligible_answered() {
            self.settle(scores, broadcaster, &mut schedule);
        }

        Ok(())
    }

    /// Returns the current question's source reference
    ///
    /// Only participants whose answer was already accepted may see it;
    /// everyone else gets `None`.
    pub fn request_source(&self, id: Id) -> Option<&str> {
        let participant = self.registry.get(id)?;
        if !participant.has_answered {
            return None;
        }
        self.current_source.as_deref()
    }

    /// Starts a new round if the session can support one
    ///
    /// Requires at least one registered participant and an available
    /// question; otherwise the session stays idle and the next join retries.
    /// A successful start allocates the next round number, marks everyone
    /// present eligible, arms the round timeout, and announces the prompt
    /// (never the correct answer).
    fn start_round<T, Q, S>(
        &mut self,
        questions: &Q,
        broadcaster: &Broadcaster<T>,
        mut schedule: S,
    ) -> bool
    where
        T: Tunnel,
        Q: QuestionSource,
        S: FnMut(AlarmMessage, Duration),
    {
        if self.round_active() {
            return false;
        }
        if self.registry.is_empty() {
            self.state = State::Idle;
            return false;
        }
        let Some(question) = questions.random_question() else {
            warn!("question source is exhausted, round start deferred");
            self.state = State::Idle;
            return false;
        };

        // The number is allocated only once a question is in hand, so a
        // deferred start never leaves a gap in the sequence.
        let number = self.round_counter + 1;
        self.round_counter = number;

        self.registry.begin_round();
        self.current_source = question.source.clone();
        let prompt = question.prompt.clone();

        self.state = State::Active(Round {
            number,
            question,
            answers: HashMap::new(),
            started: SystemTime::now(),
        });

        schedule(
            AlarmMessage::RoundTimeout { round: number },
            self.config.round_duration,
        );

        info!("round {number} started");
        broadcaster.send_to_all(
            &UpdateMessage::NewRound {
                round_number: number,
                prompt,
            },
            None,
        );

        true
    }

    /// Settles the active round exactly once
    ///
    /// Safe to race between the timeout and the last answer: only the caller
    /// that wins the `Active` state gets the round, the loser's invocation
    /// is a no-op. Computes per-participant results over the participants
    /// registered right now, applies point awards through the score store,
    /// broadcasts `round_end`, and schedules the next round after the
    /// intermission while anyone remains.
    pub fn settle<T, SS, S>(
        &mut self,
        scores: &mut SS,
        broadcaster: &Broadcaster<T>,
        mut schedule: S,
    ) where
        T: Tunnel,
        SS: ScoreStore,
        S: FnMut(AlarmMessage, Duration),
    {
        let round = match std::mem::replace(&mut self.state, State::Idle) {
            State::Active(round) => round,
            other => {
                self.state = other;
                return;
            }
        };
        let Round {
            number,
            question,
            answers,
            started: _,
        } = round;

        let ids: Vec<Id> = self.registry.iter().map(|participant| participant.id).collect();
        let mut results = Vec::with_capacity(ids.len());

        for id in ids {
            let submitted = answers.get(&id).cloned();
            let Some(participant) = self.registry.get_mut(id) else {
                continue;
            };

            let correct = participant
                .eligible
                .then(|| submitted.as_deref().map(|answer| answer == question.answer))
                .flatten();
            let points_earned = if correct == Some(true) {
                self.config.points_awarded
            } else {
                0
            };
            if points_earned > 0 {
                participant.score = scores.award(id, points_earned);
            }

            results.push(AnswerResult {
                name: participant.name.clone(),
                submitted_answer: submitted,
                correct,
                points_earned,
                total_score: participant.score,
                was_eligible: participant.eligible,
            });
        }

        info!("round {number} settled for {} participants", results.len());
        broadcaster.send_to_all(
            &UpdateMessage::RoundEnd {
                correct_answer: question.answer,
                source: question.source,
                results,
            },
            None,
        );

        if self.registry.is_empty() {
            self.state = State::Idle;
        } else {
            self.state = State::Intermission { last_round: number };
            schedule(
                AlarmMessage::IntermissionOver { round: number },
                self.config.intermission,
            );
        }
    }

    /// Shared tail of explicit leave and disconnect handling
    fn remove_participant<T: Tunnel>(
        &mut self,
        participant: Participant,
        reason: LeaveReason,
        broadcaster: &mut Broadcaster<T>,
    ) {
        if let State::Active(round) = &mut self.state {
            round.answers.remove(&participant.id);
        }
        broadcaster.detach(participant.connection);

        match reason {
            LeaveReason::Crash => warn!("{} left the lobby after a crash", participant.name),
            _ => info!("{} left the lobby", participant.name),
        }

        broadcaster.send_to_all(
            &UpdateMessage::PlayerLeft {
                name: participant.name,
                reason,
            },
            None,
        );
        self.broadcast_player_list(broadcaster);

        // An empty intermission has nothing to schedule the next round for;
        // an active round still settles through its timer.
        if self.registry.is_empty() && matches!(self.state, State::Intermission { .. }) {
            self.state = State::Idle;
        }
    }

    /// Pushes a fresh participant list snapshot to everyone
    fn broadcast_player_list<T: Tunnel>(&self, broadcaster: &Broadcaster<T>) {
        broadcaster.send_to_all(
            &UpdateMessage::PlayerListUpdate {
                players: self.registry.list(),
            },
            None,
        );
    }

    /// Sends an error event to a single connection
    fn reject<T: Tunnel>(broadcaster: &Broadcaster<T>, connection: ConnectionId, message: &str) {
        broadcaster.send_to_one(
            connection,
            &UpdateMessage::Error {
                message: message.to_owned(),
            },
        );
    }
}
