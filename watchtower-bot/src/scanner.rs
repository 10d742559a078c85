use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use watchtower_proto::{Observer, PlayerSnapshot};

use crate::alert::{Alert, AlertSink};
use crate::status::BotStatus;
use crate::suppressor::Suppressor;

/// Decides, tick by tick, which visible players deserve an alert.
pub struct Scanner<S> {
    whitelist: HashSet<String>,
    radius: f64,
    suppressor: Suppressor,
    sink: S,
    status: Arc<BotStatus>,
}

impl<S: AlertSink> Scanner<S> {
    pub fn new(
        whitelist: impl IntoIterator<Item = String>,
        radius: f64,
        cooldown: Duration,
        sink: S,
        status: Arc<BotStatus>,
    ) -> Self {
        Self {
            whitelist: whitelist.into_iter().collect(),
            radius,
            suppressor: Suppressor::new(cooldown),
            sink,
            status,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Run one detection pass and return how many alerts were raised.
    ///
    /// Does nothing until the observer has a position. Players that are the
    /// observer, whitelisted, without a loaded entity, out of range or still
    /// cooling down are skipped.
    pub fn scan(&mut self, observer: &Observer, players: &[PlayerSnapshot]) -> usize {
        let Some(origin) = observer.position else {
            return 0;
        };
        self.status.record_scan();

        let mut raised = 0;
        for player in players {
            let name = player.name.as_str();
            if name == observer.name || self.whitelist.contains(name) {
                continue;
            }
            // Not loaded: no position to measure, whatever the real distance.
            let Some(position) = player.position else {
                continue;
            };

            let distance = origin.distance_to(position);
            if distance > self.radius || self.suppressor.is_suppressed(name) {
                continue;
            }

            info!(player = name, distance, "Unauthorized player detected");
            self.sink
                .dispatch(Alert::new(name, distance, position, origin));
            self.suppressor.suppress(name);
            raised += 1;
        }
        raised
    }

    /// Forget a player's cooldown, called when they leave the server.
    pub fn release(&mut self, player: &str) {
        if self.suppressor.release(player) {
            debug!(player, "Cooldown cleared on leave");
        }
    }

    pub fn is_suppressed(&self, player: &str) -> bool {
        self.suppressor.is_suppressed(player)
    }

    /// Next player whose cooldown elapsed; see [`Suppressor::next_expiry`].
    pub async fn next_expiry(&mut self) -> Option<String> {
        self.suppressor.next_expiry().await
    }
}
