//! The `examgate check` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};

use examgate_core::gate::{AccessDecision, AttemptGate};
use examgate_store::create_store;

use crate::config::load_config_from;

pub async fn execute(user: String, at: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let now = super::parse_at(at.as_deref())?;

    let gate = AttemptGate::new(config.gate.to_gate_config()?);
    let store = create_store(&config.store);

    let outcome = gate.check(store.as_ref(), &user, now).await;
    if let Some(e) = outcome.storage_error() {
        tracing::warn!(user = %user, "attempt history unavailable: {e}");
        println!("Notice: attempt history unavailable, access allowed by default.");
    }

    println!("{}", describe(&user, outcome.decision(), gate.config().max_attempts(), now));
    Ok(())
}

pub fn describe(user: &str, decision: &AccessDecision, max_attempts: usize, now: DateTime<Utc>) -> String {
    match decision.unlocks_at {
        Some(unlocks_at) if decision.blocked => {
            let wait = decision.wait_from(now).unwrap_or_else(chrono::Duration::zero);
            format!(
                "User {user}: blocked, {}/{max_attempts} attempts used. Next attempt unlocks at {} (in {}h {}m).",
                decision.attempts_used,
                unlocks_at.to_rfc3339(),
                wait.num_hours(),
                wait.num_minutes() % 60
            )
        }
        _ => format!(
            "User {user}: allowed, {}/{max_attempts} attempts used, {} remaining.",
            decision.attempts_used, decision.attempts_remaining
        ),
    }
}
