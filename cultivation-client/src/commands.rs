//! Interactive-free session commands: status, play, sync and reset.

use anyhow::{Result, bail};
use chrono::{TimeZone, Utc};
use colored::Colorize;
use cultivation_game::numbers::u64_to_f64;
use cultivation_game::{
    ActionEvent, BreakthroughOutcome, Clock, Faction, GENERATORS, GameAction, GameState,
    LocalCache, PurchaseOutcome, ReconcileError, Reconciled, RemoteStore, SyncHealth, SyncSession,
    breakthrough_progress, click_power, discounted_requirement, format_qi, is_generator_visible,
    next_generator_cost, passive_rate,
};
use std::io::Write;
use std::time::Duration;

const IDLE_TICK: Duration = Duration::from_secs(1);

/// Boot the session, printing the read-only preview when the remote store is
/// unreachable.
pub async fn boot<L, R, C>(
    session: &mut SyncSession<L, R, C>,
    out: &mut dyn Write,
) -> Result<Reconciled>
where
    L: LocalCache,
    R: RemoteStore,
    C: Clock,
{
    match session.boot().await {
        Ok(reconciled) => {
            writeln!(
                out,
                "🔄 Loaded {} save ({} repair(s))",
                reconciled.source.as_str().bright_white(),
                reconciled.repairs.len()
            )?;
            if let Some(err) = &reconciled.remote_repair_error {
                writeln!(out, "⚠️  Remote copy not updated: {}", err.to_string().yellow())?;
            }
            Ok(reconciled)
        }
        Err(ReconcileError::RemoteUnavailable {
            reason,
            local_preview,
        }) => {
            writeln!(out, "❌ Cloud save unavailable: {}", reason.red())?;
            if let Some(preview) = local_preview {
                writeln!(out, "{}", "Local save (read-only preview):".yellow())?;
                let health = SyncHealth::Degraded {
                    reason: reason.clone(),
                    retryable: true,
                };
                render_status(out, &preview, &health)?;
            }
            bail!("cannot play until the cloud save can be loaded: {reason}")
        }
        Err(err) => bail!(err),
    }
}

/// Print a status block for `state`.
pub fn render_status(out: &mut dyn Write, state: &GameState, health: &SyncHealth) -> Result<()> {
    writeln!(
        out,
        "{} {} (stage {}) - {}",
        "🧘".bold(),
        state.realm.name.bright_cyan().bold(),
        state.realm.stage,
        state.realm.world
    )?;
    writeln!(out, "   Multiplier: x{}", state.realm.multiplier)?;
    writeln!(
        out,
        "   Qi: {} (lifetime {})",
        format_qi(state.resources.qi),
        format_qi(state.resources.total_qi)
    )?;
    writeln!(
        out,
        "   Qi per tap: {} | Qi per second: {}",
        format_qi(click_power(state)),
        format_qi(passive_rate(state))
    )?;
    let required = discounted_requirement(state.realm.id, state.realm.stage, state.faction);
    writeln!(
        out,
        "   Breakthrough: {:.1}% of {}",
        breakthrough_progress(state) * 100.0,
        format_qi(required)
    )?;
    for (index, generator) in GENERATORS.iter().enumerate() {
        if !is_generator_visible(state, index) {
            continue;
        }
        let cost = next_generator_cost(state, generator.key).unwrap_or_default();
        writeln!(
            out,
            "   {:16} owned {:>4} | next {}",
            generator.label,
            state.generator_count(generator.key),
            format_qi(u64_to_f64(cost))
        )?;
    }
    let faction = state.faction.map_or("none", Faction::label);
    writeln!(
        out,
        "   Faction: {faction} | Theme: {}",
        state.settings.theme
    )?;
    writeln!(out, "   Last saved: {}", format_save_time(state.last_save_time))?;
    let health_line = match health {
        SyncHealth::Synced => "synced".green(),
        SyncHealth::Degraded {
            reason,
            retryable: true,
        } => format!("local only, will retry ({reason})").yellow(),
        SyncHealth::Degraded {
            reason,
            retryable: false,
        } => format!("local only, cloud refused the save ({reason})").red(),
        SyncHealth::ReauthRequired => "sign in again".red(),
    };
    writeln!(out, "   Cloud: {health_line}")?;
    Ok(())
}

fn format_save_time(millis: u64) -> String {
    if millis == 0 {
        return "never".to_string();
    }
    i64::try_from(millis)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map_or_else(
            || millis.to_string(),
            |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub clicks: usize,
    pub idle: Duration,
    pub auto_buy: bool,
    pub auto_breakthrough: bool,
    pub faction: Option<Faction>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaySummary {
    pub clicked: f64,
    pub produced: f64,
    pub purchases: usize,
    pub breakthroughs: usize,
}

/// Drive the session: optional faction pick, clicks with auto-buy and
/// auto-breakthrough, then idle production on the real clock.
pub async fn play<L, R, C>(
    session: &mut SyncSession<L, R, C>,
    options: &PlayOptions,
    out: &mut dyn Write,
) -> Result<PlaySummary>
where
    L: LocalCache,
    R: RemoteStore,
    C: Clock,
{
    let mut summary = PlaySummary::default();

    if let Some(faction) = options.faction {
        match session.dispatch(&GameAction::SelectFaction(faction)).await? {
            ActionEvent::FactionLocked(existing) => {
                writeln!(out, "⚠️  Already sworn to the {}", existing.label().yellow())?;
            }
            _ => writeln!(out, "⚔️  Joined the {}", faction.label().bright_white())?,
        }
    }

    for _ in 0..options.clicks {
        if let ActionEvent::Clicked { gained } = session.dispatch(&GameAction::Click).await? {
            summary.clicked += gained;
        }
        if options.auto_buy {
            summary.purchases += auto_buy(session, out).await?;
        }
        if options.auto_breakthrough {
            summary.breakthroughs += auto_breakthrough(session, out).await?;
        }
    }

    let mut remaining = options.idle;
    while !remaining.is_zero() {
        let step = remaining.min(IDLE_TICK);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
        let report = session.tick().await?;
        summary.produced += report.produced;
        if let Some(err) = report.remote_error {
            log::warn!("periodic cloud save failed: {err}");
        }
    }

    writeln!(
        out,
        "✨ Gathered {} qi by hand, {} passively, {} purchase(s), {} breakthrough(s)",
        format_qi(summary.clicked),
        format_qi(summary.produced),
        summary.purchases,
        summary.breakthroughs
    )?;
    Ok(summary)
}

/// Buy the most expensive visible generator that is affordable, repeatedly.
async fn auto_buy<L, R, C>(session: &mut SyncSession<L, R, C>, out: &mut dyn Write) -> Result<usize>
where
    L: LocalCache,
    R: RemoteStore,
    C: Clock,
{
    let mut bought = 0;
    loop {
        let Some(state) = session.state() else {
            return Ok(bought);
        };
        let candidate = GENERATORS
            .iter()
            .enumerate()
            .rev()
            .filter(|(index, _)| is_generator_visible(state, *index))
            .find(|(_, generator)| {
                next_generator_cost(state, generator.key)
                    .is_some_and(|cost| u64_to_f64(cost) <= state.resources.qi)
            })
            .map(|(_, generator)| generator.key.to_string());
        let Some(key) = candidate else {
            return Ok(bought);
        };
        match session.dispatch(&GameAction::Purchase(key)).await? {
            ActionEvent::Purchase(PurchaseOutcome::Bought { key, owned, cost }) => {
                writeln!(out, "🛒 Bought {key} #{owned} for {}", format_qi(u64_to_f64(cost)))?;
                bought += 1;
            }
            _ => return Ok(bought),
        }
    }
}

async fn auto_breakthrough<L, R, C>(
    session: &mut SyncSession<L, R, C>,
    out: &mut dyn Write,
) -> Result<usize>
where
    L: LocalCache,
    R: RemoteStore,
    C: Clock,
{
    let ready = session
        .state()
        .is_some_and(|state| breakthrough_progress(state) >= 1.0);
    if !ready {
        return Ok(0);
    }
    match session.dispatch(&GameAction::Breakthrough).await? {
        ActionEvent::Breakthrough(BreakthroughOutcome::Minor { stage, .. }) => {
            writeln!(out, "🌟 Breakthrough! Now at stage {stage}")?;
            Ok(1)
        }
        ActionEvent::Breakthrough(BreakthroughOutcome::Major { name, .. }) => {
            writeln!(out, "🌌 Major breakthrough! Entered {}", name.bright_cyan().bold())?;
            Ok(1)
        }
        ActionEvent::Breakthrough(BreakthroughOutcome::MaxRealmReached) => {
            writeln!(out, "🏔️  The peak has been reached")?;
            Ok(0)
        }
        _ => Ok(0),
    }
}
