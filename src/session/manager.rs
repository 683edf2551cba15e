//! Session Manager
//!
//! Owns all live sessions, pending invites and the player → session index.
//!
//! ## Locking
//!
//! Two tiers, always acquired in this order:
//!
//! 1. the registry lock (invites, index, session table), held only for
//!    short insert/lookup/delete sections;
//! 2. a per-session lock, held for a whole read-modify-write such as
//!    recording a move or resolving a round.
//!
//! The turn-timer table is innermost. No operation takes the registry lock
//! while holding a session lock, and no two session locks are held at once.
//! Every mutating operation re-checks the session's state after locking it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::core::token::{generate_token, InviteToken};
use crate::game::events::{FinishReason, SessionEvent};
use crate::game::round::{resolve_round, RoundResolution};
use crate::game::state::{
    Choice, MatchStanding, PendingInvite, Player, PlayerId, Session, SessionId, Side,
};
use crate::session::config::ManagerConfig;
use crate::session::error::{GameError, StateConflict};
use crate::session::timer::{spawn_after, TurnTimers};

/// A session behind its own lock.
///
/// Handles returned by lookups may outlive the session's binding to a
/// player; re-validate state after locking.
pub type SharedSession = Arc<RwLock<Session>>;

/// Result of resolving a round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundReport {
    /// Session after the round
    pub session: Session,
    /// Round record and outcome text
    pub resolution: RoundResolution,
}

impl RoundReport {
    /// Outcome text for one participant.
    pub fn outcome_for(&self, player_id: &PlayerId) -> Option<&str> {
        match self.session.side_of(player_id)? {
            Side::A => Some(&self.resolution.outcome_a),
            Side::B => Some(&self.resolution.outcome_b),
        }
    }
}

/// Result of enforcing a turn deadline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutReport {
    /// Session after the timeout (always finished)
    pub session: Session,
    /// Player who was assigned a forced defect
    pub timed_out: Player,
    /// The other player
    pub active: Player,
    /// Round resolved with the forced move, if the active player had moved
    pub resolution: Option<RoundResolution>,
}

struct SessionEntry {
    epoch: u64,
    session: SharedSession,
}

#[derive(Default)]
struct Registry {
    sessions: BTreeMap<SessionId, SessionEntry>,
    invites: BTreeMap<InviteToken, PendingInvite>,
    player_sessions: BTreeMap<PlayerId, SessionId>,
}

impl Registry {
    fn unbind_session(&mut self, session_id: SessionId, players: [PlayerId; 2]) {
        for player_id in players {
            if self.player_sessions.get(&player_id) == Some(&session_id) {
                self.player_sessions.remove(&player_id);
            }
        }
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Manages all invites and sessions.
///
/// Construct once and share as `Arc<SessionManager>`; operations that arm
/// timers or schedule retirement take `self: &Arc<Self>` so the spawned
/// tasks can reach back (through a `Weak`) without keeping it alive.
pub struct SessionManager {
    config: ManagerConfig,
    registry: RwLock<Registry>,
    timers: TurnTimers,
    next_epoch: AtomicU64,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create new session manager.
    pub fn new(config: ManagerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            config,
            registry: RwLock::new(Registry::default()),
            timers: TurnTimers::new(),
            next_epoch: AtomicU64::new(1),
            event_tx,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn next_epoch(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Invites
    // -------------------------------------------------------------------------

    /// Issue an invite token for `rounds` rounds.
    #[instrument(skip(self, inviter_name))]
    pub async fn create_invite(
        &self,
        inviter_id: PlayerId,
        inviter_name: &str,
        rounds: u32,
    ) -> Result<InviteToken, GameError> {
        if rounds == 0 {
            return Err(GameError::InvalidRounds);
        }

        let token = generate_token(self.config.token_bytes)?;

        {
            let mut registry = self.registry.write().await;
            if registry.player_sessions.contains_key(&inviter_id) {
                return Err(GameError::AlreadyInGame);
            }

            registry.invites.insert(token.clone(), PendingInvite {
                token: token.clone(),
                inviter_id,
                inviter_name: inviter_name.to_string(),
                rounds,
                created_at: Utc::now(),
            });
        }

        info!(%inviter_id, rounds, "invite created");
        self.emit(SessionEvent::InviteCreated { inviter_id, rounds });

        Ok(token)
    }

    /// Accept an invite, starting a session between inviter and accepter.
    #[instrument(skip(self, token, accepter_name))]
    pub async fn accept_invite(
        self: &Arc<Self>,
        token: &str,
        accepter_id: PlayerId,
        accepter_name: &str,
    ) -> Result<Session, GameError> {
        let now = Utc::now();
        let token = InviteToken::new(token);

        let snapshot = {
            let mut registry = self.registry.write().await;

            let invite = registry
                .invites
                .get(&token)
                .cloned()
                .ok_or(GameError::InvalidInvite)?;

            if invite.is_expired(now, self.config.invite_ttl) {
                registry.invites.remove(&token);
                debug!(inviter_id = %invite.inviter_id, "expired invite presented");
                return Err(GameError::InvalidInvite);
            }

            if invite.inviter_id == accepter_id {
                return Err(GameError::SelfInvite);
            }

            if registry.player_sessions.contains_key(&accepter_id)
                || registry.player_sessions.contains_key(&invite.inviter_id)
            {
                return Err(GameError::AlreadyInGame);
            }

            let session_id = SessionId::from(invite.inviter_id);
            let epoch = self.next_epoch();
            let session = Session::new(
                session_id,
                epoch,
                Player::new(invite.inviter_id, invite.inviter_name),
                Player::new(accepter_id, accepter_name),
                invite.rounds,
                now,
                self.config.turn_timeout,
            );
            let snapshot = session.clone();

            registry.sessions.insert(session_id, SessionEntry {
                epoch,
                session: Arc::new(RwLock::new(session)),
            });
            registry.player_sessions.insert(invite.inviter_id, session_id);
            registry.player_sessions.insert(accepter_id, session_id);
            registry.invites.remove(&token);

            self.arm_turn_timer(session_id).await;
            snapshot
        };

        info!(
            session_id = %snapshot.id,
            player_a = %snapshot.player_a.id,
            player_b = %snapshot.player_b.id,
            rounds = snapshot.total_rounds,
            "session started"
        );
        self.emit(SessionEvent::GameStarted {
            session_id: snapshot.id,
            player_a: snapshot.player_a.id,
            player_b: snapshot.player_b.id,
            total_rounds: snapshot.total_rounds,
            rematch: false,
        });

        Ok(snapshot)
    }

    /// Drop every invite older than the configured TTL.
    pub async fn purge_expired_invites(&self) -> usize {
        let now = Utc::now();
        let ttl = self.config.invite_ttl;

        let mut registry = self.registry.write().await;
        let before = registry.invites.len();
        registry.invites.retain(|_, invite| !invite.is_expired(now, ttl));
        let purged = before - registry.invites.len();

        if purged > 0 {
            debug!(purged, "expired invites purged");
        }
        purged
    }

    /// Get pending invite count.
    pub async fn invite_count(&self) -> usize {
        self.registry.read().await.invites.len()
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Get a session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<SharedSession> {
        let registry = self.registry.read().await;
        registry.sessions.get(id).map(|entry| entry.session.clone())
    }

    /// Get the session a player is bound to.
    pub async fn find_session_by_player(&self, player_id: &PlayerId) -> Option<SharedSession> {
        let registry = self.registry.read().await;
        let session_id = registry.player_sessions.get(player_id)?;
        registry.sessions.get(session_id).map(|entry| entry.session.clone())
    }

    /// Copy of the session a player is bound to.
    pub async fn session_snapshot(&self, player_id: &PlayerId) -> Option<Session> {
        let shared = self.find_session_by_player(player_id).await?;
        let session = shared.read().await;
        Some(session.clone())
    }

    /// Check whether a player is bound to any session.
    pub async fn is_in_game(&self, player_id: &PlayerId) -> bool {
        self.registry.read().await.player_sessions.contains_key(player_id)
    }

    /// Get session count (live and awaiting retirement).
    pub async fn session_count(&self) -> usize {
        self.registry.read().await.sessions.len()
    }

    #[cfg(test)]
    pub(crate) async fn has_turn_timer(&self, session_id: SessionId) -> bool {
        self.timers.is_armed(session_id).await
    }

    #[cfg(test)]
    pub(crate) async fn armed_timer_count(&self) -> usize {
        self.timers.armed_count().await
    }

    // -------------------------------------------------------------------------
    // Moves and rounds
    // -------------------------------------------------------------------------

    /// Record a move for the current round.
    ///
    /// Returns the session and whether both moves are now in. Exactly one of
    /// the two submitting players sees `true`; that caller must call
    /// [`process_round`](Self::process_round).
    #[instrument(skip(self))]
    pub async fn record_choice(
        &self,
        player_id: PlayerId,
        choice: Choice,
    ) -> Result<(Session, bool), GameError> {
        let shared = self
            .find_session_by_player(&player_id)
            .await
            .ok_or(GameError::NotInGame)?;

        let mut session = shared.write().await;

        let side = session.side_of(&player_id).ok_or(GameError::NotInGame)?;
        if !session.is_in_progress() {
            return Err(StateConflict::NotInProgress.into());
        }
        if session.both_chosen() {
            return Err(StateConflict::RoundComplete.into());
        }

        let player = session.player_mut(side);
        player.choice = Some(choice);
        player.last_move_at = Some(Utc::now());

        let both_submitted = session.both_chosen();
        if both_submitted {
            self.timers.cancel(session.id).await;
        }

        let snapshot = session.clone();
        drop(session);

        debug!(session_id = %snapshot.id, round = snapshot.current_round, both_submitted, "choice recorded");
        self.emit(SessionEvent::ChoiceRecorded {
            session_id: snapshot.id,
            player_id,
            round: snapshot.current_round,
            both_submitted,
        });

        Ok((snapshot, both_submitted))
    }

    /// Score the current round once both moves are in.
    ///
    /// Finishes the session at its round limit; otherwise moves the deadline
    /// and re-arms the turn timer.
    #[instrument(skip(self))]
    pub async fn process_round(self: &Arc<Self>, session_id: SessionId) -> Result<RoundReport, GameError> {
        let shared = self
            .get_session(&session_id)
            .await
            .ok_or(GameError::NotFound(session_id))?;

        let mut session = shared.write().await;

        if !session.is_in_progress() {
            return Err(StateConflict::NotInProgress.into());
        }

        let resolution = resolve_round(&mut session, Utc::now(), self.config.turn_timeout)
            .ok_or(GameError::WrongState(StateConflict::AwaitingMoves))?;

        if resolution.finished {
            self.timers.cancel(session_id).await;
            self.schedule_retirement(session_id, session.epoch);
        } else {
            self.arm_turn_timer(session_id).await;
        }

        let snapshot = session.clone();
        drop(session);

        info!(
            %session_id,
            round = resolution.result.round,
            total = snapshot.total_rounds,
            delta_a = resolution.result.delta_a,
            delta_b = resolution.result.delta_b,
            "round resolved"
        );
        #[cfg(feature = "debug-tracing")]
        debug!(session = ?snapshot, "session after round");

        self.emit(SessionEvent::RoundResolved {
            session_id,
            result: resolution.result.clone(),
            total_rounds: snapshot.total_rounds,
            score_a: snapshot.player_a.score,
            score_b: snapshot.player_b.score,
        });
        if resolution.finished {
            self.announce_finish(&snapshot, FinishReason::RoundLimit, None);
        }

        Ok(RoundReport {
            session: snapshot,
            resolution,
        })
    }

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------

    async fn arm_turn_timer(self: &Arc<Self>, session_id: SessionId) {
        let manager = Arc::downgrade(self);
        self.timers
            .arm(session_id, self.config.turn_timeout, move |generation| async move {
                if let Some(manager) = manager.upgrade() {
                    manager.on_turn_timer(session_id, generation).await;
                }
            })
            .await;
    }

    async fn on_turn_timer(self: &Arc<Self>, session_id: SessionId, generation: u64) {
        let Some(shared) = self.get_session(&session_id).await else {
            return;
        };

        // Claim under the session lock: moves, rounds and rematches cancel or
        // re-arm while holding it, so a claim that succeeds here belongs to
        // the round the session is still in.
        let mut session = shared.write().await;
        if !self.timers.claim(session_id, generation).await {
            debug!(%session_id, generation, "stale turn timer ignored");
            return;
        }

        match self.expire_turn(&mut session).await {
            Ok(report) => {
                info!(
                    %session_id,
                    timed_out = %report.timed_out.id,
                    round_resolved = report.resolution.is_some(),
                    "turn deadline enforced"
                );
            }
            Err(e) => debug!(%session_id, "turn timer no-op: {}", e),
        }
    }

    /// Enforce the turn deadline for a session.
    ///
    /// The first player without a move (A before B) is given a forced
    /// defect; if the other player had moved, the round is scored with it.
    /// The session finishes either way.
    #[instrument(skip(self))]
    pub async fn handle_timeout(self: &Arc<Self>, session_id: SessionId) -> Result<TimeoutReport, GameError> {
        let shared = self
            .get_session(&session_id)
            .await
            .ok_or(GameError::NotFound(session_id))?;

        let mut session = shared.write().await;
        self.expire_turn(&mut session).await
    }

    async fn expire_turn(self: &Arc<Self>, session: &mut Session) -> Result<TimeoutReport, GameError> {
        if !session.is_in_progress() {
            return Err(StateConflict::NotInProgress.into());
        }
        if session.both_chosen() {
            // Lost the race with the second move; that caller resolves.
            return Err(StateConflict::RoundComplete.into());
        }

        let session_id = session.id;
        let now = Utc::now();
        let timed_out_side = if session.player_a.has_chosen() { Side::B } else { Side::A };
        let active_side = timed_out_side.other();

        session.player_mut(timed_out_side).choice = Some(Choice::Defect);

        let resolution = if session.player(active_side).has_chosen() {
            resolve_round(session, now, self.config.turn_timeout)
        } else {
            None
        };

        session.finish(now);
        self.timers.cancel(session_id).await;
        self.schedule_retirement(session_id, session.epoch);

        let report = TimeoutReport {
            session: session.clone(),
            timed_out: session.player(timed_out_side).clone(),
            active: session.player(active_side).clone(),
            resolution,
        };

        warn!(%session_id, timed_out = %report.timed_out.id, "player missed turn deadline");

        if let Some(resolution) = &report.resolution {
            self.emit(SessionEvent::RoundResolved {
                session_id,
                result: resolution.result.clone(),
                total_rounds: report.session.total_rounds,
                score_a: report.session.player_a.score,
                score_b: report.session.player_b.score,
            });
        }
        self.emit(SessionEvent::TimedOut {
            session_id,
            timed_out: report.timed_out.id,
            active: report.active.id,
        });
        self.announce_finish(&report.session, FinishReason::Timeout, None);

        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Departure
    // -------------------------------------------------------------------------

    /// Quit a running match; the other player wins regardless of score.
    #[instrument(skip(self))]
    pub async fn forfeit(self: &Arc<Self>, player_id: PlayerId) -> Result<(Session, Player), GameError> {
        let shared = self
            .find_session_by_player(&player_id)
            .await
            .ok_or(GameError::NotInGame)?;

        let mut session = shared.write().await;

        let side = session.side_of(&player_id).ok_or(GameError::NotInGame)?;
        if !session.is_in_progress() {
            return Err(StateConflict::NotInProgress.into());
        }

        session.finish(Utc::now());
        self.timers.cancel(session.id).await;
        self.schedule_retirement(session.id, session.epoch);

        let winner = session.player(side.other()).clone();
        let snapshot = session.clone();
        drop(session);

        info!(session_id = %snapshot.id, quitter = %player_id, winner = %winner.id, "player forfeited");
        self.emit(SessionEvent::Forfeited {
            session_id: snapshot.id,
            quitter: player_id,
            winner: winner.id,
        });
        self.announce_finish(&snapshot, FinishReason::Forfeit, Some(winner.id));

        Ok((snapshot, winner))
    }

    fn announce_finish(&self, session: &Session, reason: FinishReason, winner: Option<PlayerId>) {
        let winner = winner.or(match session.standing() {
            MatchStanding::Winner { player_id } => Some(player_id),
            MatchStanding::Draw => None,
        });

        info!(
            session_id = %session.id,
            ?reason,
            score_a = session.player_a.score,
            score_b = session.player_b.score,
            "game finished"
        );
        self.emit(SessionEvent::GameFinished {
            session_id: session.id,
            reason,
            winner,
            score_a: session.player_a.score,
            score_b: session.player_b.score,
        });
    }

    // -------------------------------------------------------------------------
    // Rematch
    // -------------------------------------------------------------------------

    /// Record a player's rematch answer for their finished session.
    ///
    /// A decline releases both players at once. Returns whether both have
    /// now accepted; only the call that completes the pair sees `true`, and
    /// that caller must call [`start_rematch`](Self::start_rematch).
    #[instrument(skip(self))]
    pub async fn set_rematch_preference(
        &self,
        player_id: PlayerId,
        wants_rematch: bool,
    ) -> Result<(Session, bool), GameError> {
        let mut registry = self.registry.write().await;

        let session_id = registry
            .player_sessions
            .get(&player_id)
            .copied()
            .ok_or(GameError::NotInGame)?;
        let shared = registry
            .sessions
            .get(&session_id)
            .map(|entry| entry.session.clone())
            .ok_or(GameError::NotFound(session_id))?;

        let mut session = shared.write().await;

        if !session.is_finished() {
            return Err(StateConflict::NotFinished.into());
        }
        let side = session.side_of(&player_id).ok_or(GameError::NotInGame)?;

        let player = session.player_mut(side);
        let already = player.wants_rematch;
        player.wants_rematch = wants_rematch;

        if !wants_rematch {
            registry.unbind_session(session_id, [session.player_a.id, session.player_b.id]);
            let snapshot = session.clone();
            drop(session);
            drop(registry);

            info!(%session_id, decliner = %player_id, "rematch declined");
            self.emit(SessionEvent::RematchDeclined {
                session_id,
                decliner: player_id,
            });
            return Ok((snapshot, false));
        }

        let both_accepted = !already && session.both_want_rematch();
        let snapshot = session.clone();
        drop(session);
        drop(registry);

        if both_accepted {
            info!(%session_id, "rematch accepted by both players");
            self.emit(SessionEvent::RematchAccepted { session_id });
        }

        Ok((snapshot, both_accepted))
    }

    /// Restart a finished session whose players both accepted a rematch.
    #[instrument(skip(self))]
    pub async fn start_rematch(self: &Arc<Self>, session_id: SessionId) -> Result<Session, GameError> {
        let mut registry = self.registry.write().await;

        let previous = registry
            .sessions
            .get(&session_id)
            .map(|entry| entry.session.clone())
            .ok_or(GameError::NotFound(session_id))?;

        let fresh = {
            let previous = previous.read().await;
            if !previous.is_finished() {
                return Err(StateConflict::NotFinished.into());
            }
            if !previous.both_want_rematch() {
                return Err(StateConflict::RematchNotAgreed.into());
            }
            previous.rematch(self.next_epoch(), Utc::now(), self.config.turn_timeout)
        };

        let snapshot = fresh.clone();
        registry.sessions.insert(session_id, SessionEntry {
            epoch: fresh.epoch,
            session: Arc::new(RwLock::new(fresh)),
        });
        registry.player_sessions.insert(snapshot.player_a.id, session_id);
        registry.player_sessions.insert(snapshot.player_b.id, session_id);

        self.arm_turn_timer(session_id).await;
        drop(registry);

        info!(%session_id, epoch = snapshot.epoch, "rematch started");
        self.emit(SessionEvent::GameStarted {
            session_id,
            player_a: snapshot.player_a.id,
            player_b: snapshot.player_b.id,
            total_rounds: snapshot.total_rounds,
            rematch: true,
        });

        Ok(snapshot)
    }

    // -------------------------------------------------------------------------
    // Retirement
    // -------------------------------------------------------------------------

    fn schedule_retirement(self: &Arc<Self>, session_id: SessionId, epoch: u64) {
        let manager = Arc::downgrade(self);
        spawn_after(self.config.retention, async move {
            if let Some(manager) = manager.upgrade() {
                manager.retire(session_id, epoch).await;
            }
        });
    }

    /// Remove a finished session instance if it is still the registered one.
    async fn retire(&self, session_id: SessionId, epoch: u64) -> bool {
        let mut registry = self.registry.write().await;

        let shared = match registry.sessions.get(&session_id) {
            Some(entry) if entry.epoch == epoch => entry.session.clone(),
            _ => {
                debug!(%session_id, epoch, "retirement skipped, session replaced");
                return false;
            }
        };

        let players = {
            let session = shared.read().await;
            if !session.is_finished() {
                return false;
            }
            [session.player_a.id, session.player_b.id]
        };

        registry.sessions.remove(&session_id);
        registry.unbind_session(session_id, players);
        drop(registry);

        debug!(%session_id, epoch, "session retired");
        self.emit(SessionEvent::SessionRetired { session_id });
        true
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}
