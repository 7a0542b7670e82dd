//! Fixed-rate driver that ticks every room from one loop

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{Config, TickPolicy};
use crate::util::time::Timer;

use super::registry::RoomRegistry;

/// Drives all rooms at the configured tick rate
pub struct TickScheduler {
    registry: Arc<RoomRegistry>,
    period: Duration,
    policy: TickPolicy,
}

impl TickScheduler {
    pub fn new(registry: Arc<RoomRegistry>, config: &Config) -> Self {
        Self {
            registry,
            period: config.tick_period(),
            policy: config.tick_policy,
        }
    }

    /// Tick every registered room once, in key order. Returns the number of rooms ticked.
    pub fn tick_all(&self) -> usize {
        let rooms = self.registry.rooms();
        for room in &rooms {
            room.lock().tick();
        }
        rooms.len()
    }

    /// Run the tick loop forever
    pub async fn run(self) {
        info!(
            period_micros = self.period.as_micros() as u64,
            policy = ?self.policy,
            "Tick scheduler started"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(missed_tick_behavior(self.policy));

        loop {
            ticker.tick().await;

            let timer = Timer::new();
            let rooms = self.tick_all();
            if timer.elapsed() > self.period {
                warn!(
                    rooms,
                    elapsed_micros = timer.elapsed_micros(),
                    "Tick overran its period"
                );
            }
        }
    }
}

fn missed_tick_behavior(policy: TickPolicy) -> MissedTickBehavior {
    match policy {
        TickPolicy::FixedRate => MissedTickBehavior::Burst,
        TickPolicy::FixedDelay => MissedTickBehavior::Delay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::round::RoundStatus;
    use crate::game::snapshot::outbound_channel;

    #[test]
    fn policies_map_to_timer_behavior() {
        assert_eq!(
            missed_tick_behavior(TickPolicy::FixedRate),
            MissedTickBehavior::Burst
        );
        assert_eq!(
            missed_tick_behavior(TickPolicy::FixedDelay),
            MissedTickBehavior::Delay
        );
    }

    #[test]
    fn tick_all_advances_every_room() {
        let config = Arc::new(Config::default());
        let registry = Arc::new(RoomRegistry::new(config.clone()));
        let scheduler = TickScheduler::new(registry.clone(), &config);

        let mut receivers = Vec::new();
        for key in ["match-a", "match-b"] {
            for _ in 0..2 {
                let (tx, rx) = outbound_channel();
                registry.join(key, tx);
                receivers.push(rx);
            }
        }
        for rx in &mut receivers {
            while rx.try_recv().is_ok() {}
        }

        assert_eq!(scheduler.tick_all(), 2);
        for rx in &mut receivers {
            let frame = rx.try_recv().unwrap();
            assert!(frame.contains("\"type\":\"snapshot\""));
        }
        for room in registry.rooms() {
            assert_eq!(room.lock().status(), RoundStatus::Playing);
        }
    }

    #[tokio::test]
    async fn run_keeps_ticking_in_the_background() {
        let config = Arc::new(Config::default());
        let registry = Arc::new(RoomRegistry::new(config.clone()));
        let (tx1, mut rx1) = outbound_channel();
        let (tx2, _rx2) = outbound_channel();
        registry.join("match-live", tx1);
        registry.join("match-live", tx2);
        while rx1.try_recv().is_ok() {}

        let handle = tokio::spawn(TickScheduler::new(registry, &config).run());
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let mut snapshots = 0;
        while let Ok(frame) = rx1.try_recv() {
            if frame.contains("\"type\":\"snapshot\"") {
                snapshots += 1;
            }
        }
        assert!(snapshots >= 2, "expected several ticks, got {}", snapshots);
    }
}
