use std::time::Duration;

/// Runtime tunables for one arena server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Request/reply endpoint for join, move, fire and leave.
    pub control_addr: String,
    /// Endpoint display clients subscribe to for frames.
    pub publish_addr: String,
    pub hit_cooldown: Duration,
    pub shot_cooldown: Duration,
    /// How long a beam stays on the grid before it is erased.
    pub beam_duration: Duration,
    pub alien_tick: Duration,
    /// Unchanged ticks before the population is topped up.
    pub stagnation_threshold: u32,
    pub alien_cap: usize,
    pub initial_aliens: usize,
    /// Fixed RNG seed; None draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            control_addr: "127.0.0.1:5556".to_string(),
            publish_addr: "127.0.0.1:5555".to_string(),
            hit_cooldown: Duration::from_secs(10),
            shot_cooldown: Duration::from_secs(3),
            beam_duration: Duration::from_millis(500),
            alien_tick: Duration::from_secs(1),
            stagnation_threshold: 10,
            alien_cap: 256,
            initial_aliens: 85,
            seed: None,
        }
    }
}
