use dogfight::{JoinFailure, RemoteEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
}

/// One-line description of a drained event, for the log pane and stdout.
/// State updates are too frequent to show and return `None`.
pub fn describe(event: &RemoteEvent) -> Option<(Severity, String)> {
    let line = match event {
        RemoteEvent::Joined { id } => (Severity::Info, format!("Joined as player {}", id)),
        RemoteEvent::PeerJoined { id, .. } => (Severity::Info, format!("Player {} joined", id)),
        RemoteEvent::PeerLeft { id, reason } => {
            (Severity::Info, format!("Player {} {}", id, reason.as_str()))
        }
        RemoteEvent::PeerStateUpdated { .. } => return None,
        RemoteEvent::PeerRespawned { id, position } => (
            Severity::Info,
            format!(
                "Player {} respawned at ({:.1}, {:.1}, {:.1})",
                id, position[0], position[1], position[2]
            ),
        ),
        RemoteEvent::ShotFired {
            owner_id,
            projectile_id,
            ..
        } => (
            Severity::Info,
            format!("Player {} fired projectile {}", owner_id, projectile_id),
        ),
        RemoteEvent::PlayerHit {
            target_id,
            attacker_id,
            damage,
        } => (
            Severity::Info,
            format!(
                "Player {} hit player {} for {}",
                attacker_id, target_id, damage
            ),
        ),
        RemoteEvent::Closed { failure } => (Severity::Warn, describe_failure(*failure)),
    };
    Some(line)
}

fn describe_failure(failure: JoinFailure) -> String {
    format!("Session ended: {}", failure.as_str())
}

pub fn log_event(event: &RemoteEvent) {
    match describe(event) {
        Some((Severity::Info, line)) => log::info!("{}", line),
        Some((Severity::Warn, line)) => log::warn!("{}", line),
        None => {}
    }
}
