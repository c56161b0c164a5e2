use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    agent_interval_ms, AGENT_BASE_INTERVAL_MS, AGENT_INTERVAL_STEP_MS, AGENT_WAKE_TIMEOUT_MS,
    BOOST_CHANCE, BOOST_DURATION_MS, BOOST_TIMEOUT_MS, INPUT_QUEUE_CAPACITY, MAX_EXIT_PERMITS,
    MAX_KEYS, MAX_SPEED_BOOSTS, POWER_PELLET_DURATION_MS, RESOURCE_TIMEOUT_MS,
    STARTING_LIVES, STATE_LOCK_TIMEOUT_MS, TICK_MS, VULNERABILITY_DURATION_MS,
};
use crate::error::{Result, SimError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    pub tick_ms: u64,
    pub agent_base_interval_ms: u64,
    pub agent_interval_step_ms: u64,
    pub keys: usize,
    pub exit_permits: usize,
    pub speed_boosts: usize,
    pub resource_timeout_ms: u64,
    pub boost_timeout_ms: u64,
    pub boost_duration_ms: u64,
    pub boost_chance: f32,
    pub state_lock_timeout_ms: u64,
    pub agent_wake_timeout_ms: u64,
    pub power_pellet_duration_ms: u64,
    pub vulnerability_duration_ms: u64,
    pub queue_capacity: usize,
    pub starting_lives: u32,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: TICK_MS,
            agent_base_interval_ms: AGENT_BASE_INTERVAL_MS,
            agent_interval_step_ms: AGENT_INTERVAL_STEP_MS,
            keys: MAX_KEYS,
            exit_permits: MAX_EXIT_PERMITS,
            speed_boosts: MAX_SPEED_BOOSTS,
            resource_timeout_ms: RESOURCE_TIMEOUT_MS,
            boost_timeout_ms: BOOST_TIMEOUT_MS,
            boost_duration_ms: BOOST_DURATION_MS,
            boost_chance: BOOST_CHANCE,
            state_lock_timeout_ms: STATE_LOCK_TIMEOUT_MS,
            agent_wake_timeout_ms: AGENT_WAKE_TIMEOUT_MS,
            power_pellet_duration_ms: POWER_PELLET_DURATION_MS,
            vulnerability_duration_ms: VULNERABILITY_DURATION_MS,
            queue_capacity: INPUT_QUEUE_CAPACITY,
            starting_lives: STARTING_LIVES,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("tickMs", self.tick_ms),
            ("agentBaseIntervalMs", self.agent_base_interval_ms),
            ("stateLockTimeoutMs", self.state_lock_timeout_ms),
            ("agentWakeTimeoutMs", self.agent_wake_timeout_ms),
            ("keys", self.keys as u64),
            ("exitPermits", self.exit_permits as u64),
            ("queueCapacity", self.queue_capacity as u64),
            ("startingLives", self.starting_lives as u64),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
            return Err(SimError::Config(format!("{name} must be greater than zero")));
        }
        if !(0.0..=1.0).contains(&self.boost_chance) {
            return Err(SimError::Config(format!(
                "boostChance must be within 0..=1, got {}",
                self.boost_chance
            )));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn agent_interval(&self, agent_id: usize) -> Duration {
        Duration::from_millis(agent_interval_ms(
            self.agent_base_interval_ms,
            self.agent_interval_step_ms,
            agent_id,
        ))
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_millis(self.resource_timeout_ms)
    }

    pub fn boost_timeout(&self) -> Duration {
        Duration::from_millis(self.boost_timeout_ms)
    }

    pub fn boost_duration(&self) -> Duration {
        Duration::from_millis(self.boost_duration_ms)
    }

    pub fn state_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.state_lock_timeout_ms)
    }

    pub fn agent_wake_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_wake_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_file(name: &str) -> std::path::PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("maze-chase-config-{name}-{now}.json"))
    }

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick(), Duration::from_millis(200));
        assert_eq!(config.agent_interval(2), Duration::from_millis(300));
        assert_eq!(config.vulnerability_duration_ms, 6_000);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let path = temp_file("partial");
        fs::write(&path, r#"{"tickMs": 50, "keys": 1, "seed": 7}"#).expect("write config");
        let config = SimConfig::from_json_file(&path).expect("config should load");
        let _ = fs::remove_file(&path);

        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.keys, 1);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.exit_permits, MAX_EXIT_PERMITS);
    }

    #[test]
    fn zero_pool_is_rejected() {
        let config = SimConfig {
            exit_permits: 0,
            ..SimConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn out_of_range_boost_chance_is_rejected() {
        let config = SimConfig {
            boost_chance: 1.5,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
