//! Seeded play sessions against in-memory stores.
//!
//! Each run boots a [`SyncSession`] over a [`MemoryCache`], a [`MemoryRemote`]
//! and a [`ManualClock`], drives it with random actions, logs out, then boots
//! a second session on the same stores to see what survives.

use anyhow::{Context, Result};
use cultivation_game::{
    ActionEvent, BreakthroughOutcome, Faction, GENERATORS, GameAction, GameState, LocalCache,
    ManualClock, MemoryCache, MemoryRemote, PurchaseOutcome, SaveSchedule, SnapshotSource, StoreError,
    SyncHealth, SyncSession, Theme, multiplier,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Wall clock at the start of every run (2023-11-14T22:13:20Z).
pub const START_WALL_MS: u64 = 1_700_000_000_000;
const CLOCK_STEP_BACK_MS: u64 = 3_600_000;
const LEGACY_SAVE: &str = r#"{"resources":{"qi":42,"totalQi":42},"realm":{"name":"Mortal"},"settings":{"theme":"light"},"lastSaveTime":1}"#;

type Session = SyncSession<MemoryCache, MemoryRemote, ManualClock>;

/// Scripted disturbance applied on top of random play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Script {
    RandomPlay,
    /// The remote store drops out halfway and stays down through logout.
    OfflineReconnect,
    /// Progress is wiped at the end of play.
    HardReset,
    /// The wall clock jumps back an hour halfway.
    ClockSkew,
    /// The local cache starts with a save from before realms had ids.
    LegacyMigration,
}

impl Script {
    pub const fn label(self) -> &'static str {
        match self {
            Self::RandomPlay => "random-play",
            Self::OfflineReconnect => "offline-reconnect",
            Self::HardReset => "hard-reset",
            Self::ClockSkew => "clock-skew",
            Self::LegacyMigration => "legacy-migration",
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type SimulationExpectationFn = Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub script: Script,
    pub steps: usize,
    /// Qi in the pre-seeded local save. Zero starts from a blank slate.
    pub starting_qi: f64,
    pub schedule: SaveSchedule,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            steps: 100,
            starting_qi: 0.0,
            schedule: SaveSchedule::default(),
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    #[must_use]
    pub const fn with_starting_qi(mut self, qi: f64) -> Self {
        self.starting_qi = qi;
        self
    }

    #[must_use]
    pub fn with_expectation<F>(mut self, f: F) -> Self
    where
        F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
    {
        self.expectations.push(SimulationExpectation::new(f));
        self
    }
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub script: Script,
    pub steps: usize,
    pub clicks: usize,
    pub purchases: usize,
    pub breakthroughs: usize,
    /// Per-step invariant failures, in order.
    pub violations: Vec<String>,
    pub first_boot: SnapshotSource,
    pub first_boot_state: GameState,
    pub health_at_logout: SyncHealth,
    pub logout_flushed: bool,
    /// Every distinct `lastSaveTime` the remote store held, in arrival order.
    pub remote_stamps: Vec<u64>,
    /// Store contents between logout and the second boot.
    pub local_before_reboot: Option<GameState>,
    pub remote_before_reboot: Option<GameState>,
    pub reboot_source: SnapshotSource,
    pub reboot_state: GameState,
    /// Store contents after the second boot.
    pub local_after_reboot: Option<GameState>,
    pub remote_after_reboot: Option<GameState>,
}

impl SimulationSummary {
    /// Whichever store held the newer snapshot before the second boot.
    pub fn newest_before_reboot(&self) -> Option<&GameState> {
        match (&self.local_before_reboot, &self.remote_before_reboot) {
            (Some(local), Some(remote)) if remote.last_save_time > local.last_save_time => {
                Some(remote)
            }
            (Some(local), _) => Some(local),
            (None, remote) => remote.as_ref(),
        }
    }
}

struct Stores {
    local: MemoryCache,
    remote: MemoryRemote,
    clock: ManualClock,
}

impl Stores {
    fn seeded(plan: &SimulationPlan) -> Self {
        let local = if plan.script == Script::LegacyMigration {
            let cache = MemoryCache::default();
            cache.store(LEGACY_SAVE);
            cache
        } else if plan.starting_qi > 0.0 {
            let mut state = GameState::default();
            state.resources.qi = plan.starting_qi;
            state.resources.total_qi = plan.starting_qi;
            state.last_save_time = 1;
            MemoryCache::with_state(&state)
        } else {
            MemoryCache::default()
        };
        Self {
            local,
            remote: MemoryRemote::default(),
            clock: ManualClock::starting_at(START_WALL_MS),
        }
    }

    fn session(&self, schedule: SaveSchedule) -> Session {
        SyncSession::new(
            self.local.clone(),
            self.remote.clone(),
            self.clock.clone(),
            schedule,
        )
    }
}

/// Run `plan` once with `seed`.
pub async fn run_plan(plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
    let stores = Stores::seeded(plan);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut session = stores.session(plan.schedule);
    let first = session
        .boot()
        .await
        .context("first boot failed to reconcile")?;

    let mut recorder = Recorder::default();
    let midpoint = plan.steps / 2;
    for step in 0..plan.steps {
        if step == midpoint {
            apply_disturbance(plan.script, &stores);
        }
        let before = session.state().cloned().context("session lost its state")?;
        match random_step(&mut rng) {
            Step::Act(action) => {
                let event = session.dispatch(&action).await?;
                recorder.record_event(&event);
            }
            Step::Idle(elapsed) => {
                stores.clock.advance(elapsed);
                session.tick().await?;
            }
        }
        let after = session.state().context("session lost its state")?;
        recorder.check(step, &before, after);
        recorder.record_remote(&stores.remote);
    }

    if plan.script == Script::HardReset {
        session.dispatch(&GameAction::HardReset).await?;
        recorder.record_remote(&stores.remote);
    }

    let health_at_logout = session.health().clone();
    let logout = session.logout().await;
    recorder.record_remote(&stores.remote);

    if plan.script == Script::OfflineReconnect {
        stores.remote.fail_with(None);
    }
    let local_before_reboot = stores.local.state();
    let remote_before_reboot = stores.remote.state();

    stores.clock.advance(Duration::from_secs(30));
    let mut second = stores.session(plan.schedule);
    let reconciled = second
        .boot()
        .await
        .context("second boot failed to reconcile")?;
    recorder.record_remote(&stores.remote);

    Ok(SimulationSummary {
        seed,
        script: plan.script,
        steps: plan.steps,
        clicks: recorder.clicks,
        purchases: recorder.purchases,
        breakthroughs: recorder.breakthroughs,
        violations: recorder.violations,
        first_boot: first.source,
        first_boot_state: first.state,
        health_at_logout,
        logout_flushed: logout.flushed,
        remote_stamps: recorder.remote_stamps,
        local_before_reboot,
        remote_before_reboot,
        reboot_source: reconciled.source,
        reboot_state: reconciled.state,
        local_after_reboot: stores.local.state(),
        remote_after_reboot: stores.remote.state(),
    })
}

fn apply_disturbance(script: Script, stores: &Stores) {
    match script {
        Script::OfflineReconnect => stores
            .remote
            .fail_with(Some(StoreError::Transient("connection reset".into()))),
        Script::ClockSkew => stores
            .clock
            .set_wall(START_WALL_MS.saturating_sub(CLOCK_STEP_BACK_MS)),
        Script::RandomPlay | Script::HardReset | Script::LegacyMigration => {}
    }
}

enum Step {
    Act(GameAction),
    /// Let time pass, then run the session's timer tick.
    Idle(Duration),
}

fn random_step(rng: &mut ChaCha8Rng) -> Step {
    let action = match rng.gen_range(0..100) {
        0..50 => GameAction::Click,
        50..65 => {
            let generator = &GENERATORS[rng.gen_range(0..GENERATORS.len())];
            GameAction::Purchase(generator.key.to_string())
        }
        65..75 => GameAction::Breakthrough,
        75..77 => GameAction::SelectFaction(Faction::ALL[rng.gen_range(0..Faction::ALL.len())]),
        77 => GameAction::SetTheme(if rng.gen_bool(0.5) {
            Theme::Light
        } else {
            Theme::Dark
        }),
        _ => return Step::Idle(Duration::from_millis(rng.gen_range(100..5_000))),
    };
    Step::Act(action)
}

#[derive(Default)]
struct Recorder {
    clicks: usize,
    purchases: usize,
    breakthroughs: usize,
    violations: Vec<String>,
    remote_stamps: Vec<u64>,
}

impl Recorder {
    fn record_event(&mut self, event: &ActionEvent) {
        match event {
            ActionEvent::Clicked { .. } => self.clicks += 1,
            ActionEvent::Purchase(PurchaseOutcome::Bought { .. }) => self.purchases += 1,
            ActionEvent::Breakthrough(
                BreakthroughOutcome::Minor { .. } | BreakthroughOutcome::Major { .. },
            ) => self.breakthroughs += 1,
            _ => {}
        }
    }

    fn check(&mut self, step: usize, before: &GameState, after: &GameState) {
        if after.resources.total_qi < before.resources.total_qi {
            self.violations.push(format!(
                "step {step}: lifetime qi fell from {} to {}",
                before.resources.total_qi, after.resources.total_qi
            ));
        }
        if after.resources.qi < 0.0 {
            self.violations
                .push(format!("step {step}: qi went negative ({})", after.resources.qi));
        }
        if let Err(err) = after.validate() {
            self.violations.push(format!("step {step}: {err}"));
        }
        if let Some(definition) = after.realm_definition() {
            let expected = multiplier(after.realm.id, after.realm.stage, definition.world_index);
            if (after.realm.multiplier - expected).abs() > f64::EPSILON {
                self.violations.push(format!(
                    "step {step}: multiplier {} does not match {expected}",
                    after.realm.multiplier
                ));
            }
        }
    }

    fn record_remote(&mut self, remote: &MemoryRemote) {
        if let Some(state) = remote.state()
            && self.remote_stamps.last() != Some(&state.last_save_time)
        {
            self.remote_stamps.push(state.last_save_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_seed_replays_identically() {
        let plan = SimulationPlan::new(Script::RandomPlay).with_steps(80);
        let first = run_plan(&plan, 7).await.unwrap();
        let second = run_plan(&plan, 7).await.unwrap();
        assert_eq!(first.clicks, second.clicks);
        assert_eq!(first.purchases, second.purchases);
        assert_eq!(first.reboot_state, second.reboot_state);
    }

    #[tokio::test]
    async fn random_play_keeps_invariants() {
        let plan = SimulationPlan::new(Script::RandomPlay)
            .with_steps(300)
            .with_starting_qi(250_000.0);
        let summary = run_plan(&plan, 1337).await.unwrap();
        assert!(summary.violations.is_empty(), "{:?}", summary.violations);
        assert_eq!(summary.first_boot, SnapshotSource::Local);
        assert!(summary.breakthroughs >= 1);
    }

    #[tokio::test]
    async fn offline_run_pushes_local_progress_on_reconnect() {
        let plan = SimulationPlan::new(Script::OfflineReconnect)
            .with_steps(120)
            .with_starting_qi(5_000.0);
        let summary = run_plan(&plan, 3).await.unwrap();
        assert!(!summary.logout_flushed);
        assert_eq!(summary.local_after_reboot, summary.remote_after_reboot);
        assert_eq!(
            Some(&summary.reboot_state),
            summary.local_after_reboot.as_ref()
        );
    }

    #[tokio::test]
    async fn legacy_save_boots_with_its_settings() {
        let plan = SimulationPlan::new(Script::LegacyMigration).with_steps(10);
        let summary = run_plan(&plan, 11).await.unwrap();
        assert_eq!(summary.first_boot, SnapshotSource::Fresh);
        assert!(summary.first_boot_state.is_mostly_empty());
        assert_eq!(summary.first_boot_state.settings.theme, Theme::Light);
        assert!(summary.violations.is_empty(), "{:?}", summary.violations);
    }

    #[test]
    fn newest_before_reboot_prefers_higher_stamp() {
        let mut local = GameState::default();
        local.last_save_time = 5;
        let mut remote = GameState::default();
        remote.last_save_time = 9;
        let summary = SimulationSummary {
            seed: 0,
            script: Script::RandomPlay,
            steps: 0,
            clicks: 0,
            purchases: 0,
            breakthroughs: 0,
            violations: Vec::new(),
            first_boot: SnapshotSource::Fresh,
            first_boot_state: GameState::default(),
            health_at_logout: SyncHealth::Synced,
            logout_flushed: true,
            remote_stamps: Vec::new(),
            local_before_reboot: Some(local),
            remote_before_reboot: Some(remote),
            reboot_source: SnapshotSource::Remote,
            reboot_state: GameState::default(),
            local_after_reboot: None,
            remote_after_reboot: None,
        };
        assert_eq!(summary.newest_before_reboot().unwrap().last_save_time, 9);
    }
}
