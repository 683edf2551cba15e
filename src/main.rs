//! Dilemma Session Server
//!
//! Runs a scripted match against the session manager and logs every
//! lifecycle event as JSON. Transports embed the library instead.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dilemma::{
    game::payoff::{PUNISHMENT, REWARD, SUCKER, TEMPTATION},
    Choice, ManagerConfig, PlayerId, Session, SessionManager, VERSION,
};

const DEMO_ROUNDS: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ManagerConfig::from_env();

    info!("Dilemma Server v{}", VERSION);
    info!("Turn timeout: {:?}", config.turn_timeout);
    info!("Retention: {:?}", config.retention);
    info!(
        "Payoffs: reward {} / temptation {} / sucker {} / punishment {}",
        REWARD, TEMPTATION, SUCKER, PUNISHMENT
    );

    let manager = Arc::new(SessionManager::new(config));

    let mut events = manager.subscribe_events();
    let logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.to_json() {
                Ok(json) => info!(target: "dilemma::events", "{}", json),
                Err(e) => warn!("Failed to encode event: {}", e),
            }
        }
    });

    demo_match(&manager).await?;

    drop(manager);
    logger.abort();

    Ok(())
}

/// Tit-for-tat against always-defect, then a rematch that gets declined.
async fn demo_match(manager: &Arc<SessionManager>) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let alice = PlayerId::new(1);
    let bob = PlayerId::new(2);

    let token = manager.create_invite(alice, "alice", DEMO_ROUNDS).await?;
    info!("Invite token: {}", token);

    let mut session = manager.accept_invite(token.as_str(), bob, "bob").await?;
    info!("Session {} started: {} rounds", session.id, session.total_rounds);

    while session.is_in_progress() {
        let alice_move = tit_for_tat(&session);
        manager.record_choice(alice, alice_move).await?;
        let (current, both) = manager.record_choice(bob, Choice::Defect).await?;
        if !both {
            anyhow::bail!("round {} did not complete", current.current_round);
        }

        let report = manager.process_round(current.id).await?;
        if let Some(text) = report.outcome_for(&alice) {
            info!("Round {} (alice): {}", report.resolution.result.round, text.replace('\n', " "));
        }
        session = report.session;
    }

    info!("=== Match Results ===");
    if let Some(summary) = session.history_summary(&alice) {
        info!("{}", summary.replace('\n', " | "));
    }
    info!("Final score: alice {} - bob {}", session.player_a.score, session.player_b.score);
    match session.leader() {
        Some(player) => info!("Winner: {}", player.name),
        None => info!("Draw"),
    }

    manager.set_rematch_preference(alice, true).await?;
    let (_, both) = manager.set_rematch_preference(bob, true).await?;
    if both {
        let rematch = manager.start_rematch(session.id).await?;
        info!("Rematch started (epoch {})", rematch.epoch);

        let (quit, winner) = manager.forfeit(bob).await?;
        info!("bob left session {}; {} wins", quit.id, winner.name);
    }

    manager.set_rematch_preference(alice, false).await?;
    info!(
        "Players released: alice={} bob={}",
        !manager.is_in_game(&alice).await,
        !manager.is_in_game(&bob).await
    );

    Ok(())
}

/// Cooperate first, then copy the opponent's last move.
fn tit_for_tat(session: &Session) -> Choice {
    session
        .history
        .last()
        .map(|round| round.choice_b)
        .unwrap_or(Choice::Cooperate)
}
