use anyhow::{Result, ensure};
use cultivation_game::{SnapshotSource, Theme};

use super::simulation::{Script, SimulationPlan, SimulationSummary};

pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    fn new(name: &str, plan: SimulationPlan) -> Self {
        Self {
            name: name.to_string(),
            plan,
        }
    }
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(smoke()),
        "random-play" | "random" => Some(random_play()),
        "offline-reconnect" | "offline" => Some(offline_reconnect()),
        "hard-reset" | "reset" => Some(hard_reset()),
        "clock-skew" | "skew" => Some(clock_skew()),
        "legacy-migration" | "legacy" => Some(legacy_migration()),
        _ => None,
    }
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("random-play", "Seeded Random Play"),
        ("offline-reconnect", "Offline Session Then Reconnect"),
        ("hard-reset", "Hard Reset Overwrites Both Stores"),
        ("clock-skew", "Wall Clock Steps Backwards"),
        ("legacy-migration", "Legacy Local Save Migration"),
    ]
}

fn no_violations(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.violations.is_empty(),
        "{} invariant violations, first: {}",
        summary.violations.len(),
        summary.violations[0]
    );
    Ok(())
}

fn stores_agree_after_reboot(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.local_after_reboot == summary.remote_after_reboot,
        "local and remote stores differ after the second boot"
    );
    Ok(())
}

fn newest_snapshot_wins(summary: &SimulationSummary) -> Result<()> {
    let expected = summary
        .newest_before_reboot()
        .map_or(0, |state| state.last_save_time);
    ensure!(
        summary.reboot_state.last_save_time == expected,
        "second boot adopted stamp {} but the newest store held {expected}",
        summary.reboot_state.last_save_time
    );
    Ok(())
}

fn smoke() -> TestScenario {
    TestScenario::new(
        "Smoke Test",
        SimulationPlan::new(Script::RandomPlay)
            .with_steps(60)
            .with_expectation(no_violations)
            .with_expectation(stores_agree_after_reboot)
            .with_expectation(|summary| {
                ensure!(summary.clicks > 0, "no clicks were recorded");
                Ok(())
            }),
    )
}

fn random_play() -> TestScenario {
    TestScenario::new(
        "Seeded Random Play",
        SimulationPlan::new(Script::RandomPlay)
            .with_steps(500)
            .with_starting_qi(250_000.0)
            .with_expectation(no_violations)
            .with_expectation(stores_agree_after_reboot)
            .with_expectation(newest_snapshot_wins)
            .with_expectation(|summary| {
                ensure!(summary.logout_flushed, "final save was not flushed");
                ensure!(
                    summary.reboot_source == SnapshotSource::Local,
                    "expected the flushed local cache to win the tie, got {:?}",
                    summary.reboot_source
                );
                Ok(())
            }),
    )
}

fn offline_reconnect() -> TestScenario {
    TestScenario::new(
        "Offline Session Then Reconnect",
        SimulationPlan::new(Script::OfflineReconnect)
            .with_steps(200)
            .with_starting_qi(5_000.0)
            .with_expectation(no_violations)
            .with_expectation(stores_agree_after_reboot)
            .with_expectation(newest_snapshot_wins)
            .with_expectation(|summary| {
                ensure!(
                    !summary.logout_flushed,
                    "logout flush succeeded while the remote store was down"
                );
                Ok(())
            }),
    )
}

fn hard_reset() -> TestScenario {
    TestScenario::new(
        "Hard Reset Overwrites Both Stores",
        SimulationPlan::new(Script::HardReset)
            .with_steps(120)
            .with_starting_qi(50_000.0)
            .with_expectation(no_violations)
            .with_expectation(stores_agree_after_reboot)
            .with_expectation(|summary| {
                ensure!(
                    summary.reboot_state.is_mostly_empty(),
                    "progress resurrected after a hard reset"
                );
                let remote_empty = summary
                    .remote_after_reboot
                    .as_ref()
                    .is_some_and(cultivation_game::GameState::is_mostly_empty);
                ensure!(remote_empty, "remote store still holds pre-reset progress");
                Ok(())
            }),
    )
}

fn clock_skew() -> TestScenario {
    TestScenario::new(
        "Wall Clock Steps Backwards",
        SimulationPlan::new(Script::ClockSkew)
            .with_steps(200)
            .with_starting_qi(5_000.0)
            .with_expectation(no_violations)
            .with_expectation(newest_snapshot_wins)
            .with_expectation(|summary| {
                let monotonic = summary
                    .remote_stamps
                    .windows(2)
                    .all(|pair| pair[1] >= pair[0]);
                ensure!(
                    monotonic,
                    "remote save stamps went backwards: {:?}",
                    summary.remote_stamps
                );
                Ok(())
            }),
    )
}

fn legacy_migration() -> TestScenario {
    TestScenario::new(
        "Legacy Local Save Migration",
        SimulationPlan::new(Script::LegacyMigration)
            .with_steps(40)
            .with_expectation(no_violations)
            .with_expectation(stores_agree_after_reboot)
            .with_expectation(|summary| {
                ensure!(
                    summary.first_boot == SnapshotSource::Fresh,
                    "legacy save should start fresh, got {:?}",
                    summary.first_boot
                );
                ensure!(
                    summary.first_boot_state.is_mostly_empty(),
                    "legacy progress leaked into the migrated state"
                );
                ensure!(
                    summary.first_boot_state.settings.theme == Theme::Light,
                    "legacy settings were not carried over"
                );
                Ok(())
            }),
    )
}
