// [apps/controller/src/services/policy.rs]
//! Load-balancing policies for the dispatcher (§4.4). Pure selection logic
//! with no store/IO dependency, so it is unit-tested directly without a
//! database.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use distflow_domain_models::device::Device;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::ControllerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancePolicy {
    RoundRobin,
    LeastTasks,
    Weighted,
    Random,
}

impl FromStr for LoadBalancePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "round_robin" => Ok(Self::RoundRobin),
            "least_tasks" => Ok(Self::LeastTasks),
            "weighted" => Ok(Self::Weighted),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown load balance strategy: {other}")),
        }
    }
}

/// Resolves the policy actually used for a tick: the configured strategy,
/// unless adaptive switching is on and the pending backlog has crossed the
/// configured threshold, in which case `least_tasks` takes over until the
/// backlog drains (§4.4 adaptive policy switching).
pub fn effective_policy(config: &ControllerConfig, pending_count: i64) -> LoadBalancePolicy {
    if config.adaptive_policy && pending_count >= config.adaptive_policy_threshold {
        return LoadBalancePolicy::LeastTasks;
    }
    config
        .load_balance_strategy
        .parse()
        .unwrap_or(LoadBalancePolicy::LeastTasks)
}

/// Round-robin's cursor is the only policy-level state that outlives a
/// single pick; every other policy is stateless per call.
#[derive(Default)]
pub struct PolicyState {
    cursor: AtomicUsize,
}

impl PolicyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks one device out of `candidates`. `weight_of` supplies the
    /// placement weight (§4.4) for the `weighted` policy, keyed by device id.
    pub fn pick<'a>(
        &self,
        policy: LoadBalancePolicy,
        candidates: &'a [Device],
        weight_of: impl Fn(&str) -> f64,
    ) -> Option<&'a Device> {
        if candidates.is_empty() {
            return None;
        }

        match policy {
            LoadBalancePolicy::RoundRobin => {
                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                candidates.get(index)
            }
            LoadBalancePolicy::LeastTasks => candidates.iter().min_by_key(|d| d.current_tasks),
            LoadBalancePolicy::Weighted => pick_weighted(candidates, weight_of),
            LoadBalancePolicy::Random => candidates.choose(&mut rand::thread_rng()),
        }
    }
}

fn pick_weighted<'a>(candidates: &'a [Device], weight_of: impl Fn(&str) -> f64) -> Option<&'a Device> {
    let total: f64 = candidates.iter().map(|d| weight_of(&d.device_id)).sum();
    if total <= 0.0 {
        return candidates.first();
    }

    let mut draw = rand::thread_rng().gen_range(0.0..total);
    for device in candidates {
        draw -= weight_of(&device.device_id);
        if draw <= 0.0 {
            return Some(device);
        }
    }
    candidates.last()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use clap::Parser;
    use distflow_domain_models::device::{Capabilities, DeviceRole, DeviceStatus};

    use super::*;

    fn device(id: &str, current_tasks: u32) -> Device {
        let now = Utc::now();
        Device {
            device_id: id.to_string(),
            device_name: id.to_string(),
            device_type: DeviceRole::Worker,
            address: None,
            capabilities: Capabilities::default(),
            max_concurrent_tasks: 10,
            current_tasks,
            status: DeviceStatus::Online,
            last_heartbeat: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn round_robin_cycles_through_all_candidates() {
        let candidates = vec![device("a", 0), device("b", 0), device("c", 0)];
        let state = PolicyState::new();
        let picks: Vec<&str> = (0..6)
            .map(|_| state.pick(LoadBalancePolicy::RoundRobin, &candidates, |_| 50.0).unwrap().device_id.as_str())
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn least_tasks_picks_the_lightest_device() {
        let candidates = vec![device("a", 3), device("b", 1), device("c", 2)];
        let state = PolicyState::new();
        let picked = state.pick(LoadBalancePolicy::LeastTasks, &candidates, |_| 50.0).unwrap();
        assert_eq!(picked.device_id, "b");
    }

    #[test]
    fn weighted_never_picks_a_zero_weight_device_when_others_have_weight() {
        let candidates = vec![device("a", 0), device("b", 0)];
        let state = PolicyState::new();
        for _ in 0..50 {
            let picked = state
                .pick(LoadBalancePolicy::Weighted, &candidates, |id| if id == "a" { 0.0 } else { 100.0 })
                .unwrap();
            assert_eq!(picked.device_id, "b");
        }
    }

    #[test]
    fn random_always_picks_a_listed_candidate() {
        let candidates = vec![device("a", 0), device("b", 0)];
        let state = PolicyState::new();
        for _ in 0..20 {
            let picked = state.pick(LoadBalancePolicy::Random, &candidates, |_| 50.0).unwrap();
            assert!(candidates.iter().any(|d| d.device_id == picked.device_id));
        }
    }

    #[test]
    fn effective_policy_switches_under_backlog_pressure() {
        let mut config = ControllerConfig::parse_from(["controller"]);
        config.adaptive_policy = true;
        config.adaptive_policy_threshold = 10;
        config.load_balance_strategy = "round_robin".into();

        assert!(matches!(effective_policy(&config, 5), LoadBalancePolicy::RoundRobin));
        assert!(matches!(effective_policy(&config, 10), LoadBalancePolicy::LeastTasks));
    }
}
