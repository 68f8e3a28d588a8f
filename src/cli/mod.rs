use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;

use crate::config::Config;
use crate::models::{
    CompetitionId, EnrichedFixture, EnrichmentBatch, FormDisplay, LiveMatchSnapshot, LiveStatus,
    Provenance, TeamForm, TeamId,
};
use crate::services::{Enricher, LiveService, WebScraper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

const CSV_COLUMNS: [&str; 21] = [
    "competition",
    "kickoff",
    "home",
    "away",
    "provenance",
    "home_rank",
    "away_rank",
    "home_form",
    "away_form",
    "home_goals_for",
    "away_goals_for",
    "home_goals_against",
    "away_goals_against",
    "home_corners",
    "away_corners",
    "home_cards",
    "away_cards",
    "home_shots_total",
    "away_shots_total",
    "home_shots_on_target",
    "away_shots_on_target",
];

pub async fn show_today(
    config: &Config,
    competitions: Option<Vec<CompetitionId>>,
    format: OutputFormat,
) -> Result<()> {
    let enricher = Enricher::from_config(config)?;
    let competitions = competitions.unwrap_or_else(|| config.enrichment.competition_ids());

    if format == OutputFormat::Table {
        println!("⚽ Enriching today's fixtures for {} competitions...", competitions.len());
    }
    let batch = enricher.enrich_today(&competitions).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&batch)?),
        OutputFormat::Csv => write_csv(&batch, std::io::stdout())?,
        OutputFormat::Table => print_table(config, &batch),
    }

    Ok(())
}

fn print_table(config: &Config, batch: &EnrichmentBatch) {
    if batch.fixtures.is_empty() {
        println!("📭 No fixtures found for {}", batch.day.format("%d/%m/%Y"));
    }

    for (competition_id, fixtures) in by_competition(&batch.fixtures) {
        println!("\n🏆 {}:", config.enrichment.competition_name(competition_id));
        for fixture in fixtures {
            print_fixture(fixture);
        }
    }

    if !batch.failures.is_empty() {
        println!("\n⚠️  {} failures:", batch.failures.len());
        for failure in &batch.failures {
            println!("   • {}", serde_json::to_string(failure).unwrap_or_default());
        }
    }
}

/// Groups fixtures per competition, keeping kick-off order inside each group.
/// Competitions appear in order of their first fixture.
fn by_competition(fixtures: &[EnrichedFixture]) -> Vec<(CompetitionId, Vec<&EnrichedFixture>)> {
    let mut groups: Vec<(CompetitionId, Vec<&EnrichedFixture>)> = Vec::new();
    for fixture in fixtures {
        let competition_id = fixture.fixture.competition_id;
        match groups.iter_mut().find(|(id, _)| *id == competition_id) {
            Some((_, members)) => members.push(fixture),
            None => groups.push((competition_id, vec![fixture])),
        }
    }
    groups
}

fn print_fixture(fixture: &EnrichedFixture) {
    println!(
        "   {} {} ({}) vs {} ({}){}",
        fixture.kickoff_local,
        fixture.fixture.home.name,
        fixture.home_standing.label(),
        fixture.fixture.away.name,
        fixture.away_standing.label(),
        match fixture.provenance {
            Provenance::Fallback => " [fallback]",
            Provenance::Primary => "",
        }
    );
    if let (Some(home), Some(away)) = (&fixture.home_form, &fixture.away_form) {
        println!(
            "      Form: {} | {}   Goals: {} | {}   Corners: {} | {}",
            or_dash(&home.form),
            or_dash(&away.form),
            home.display.goals_for,
            away.display.goals_for,
            home.display.corners,
            away.display.corners
        );
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn form_field(form: &Option<TeamForm>, pick: fn(&FormDisplay) -> &String) -> String {
    form.as_ref().map(|f| pick(&f.display).clone()).unwrap_or_default()
}

fn csv_record(fixture: &EnrichedFixture) -> Vec<String> {
    let form = |f: &Option<TeamForm>| f.as_ref().map(|f| f.form.clone()).unwrap_or_default();
    let stats: [fn(&FormDisplay) -> &String; 6] = [
        |d| &d.goals_for,
        |d| &d.goals_against,
        |d| &d.corners,
        |d| &d.cards,
        |d| &d.shots_total,
        |d| &d.shots_on_target,
    ];

    let mut record = vec![
        fixture.fixture.competition_id.to_string(),
        fixture.kickoff_local.clone(),
        fixture.fixture.home.name.clone(),
        fixture.fixture.away.name.clone(),
        format!("{:?}", fixture.provenance).to_lowercase(),
        fixture.home_standing.label(),
        fixture.away_standing.label(),
        form(&fixture.home_form),
        form(&fixture.away_form),
    ];
    for pick in stats {
        record.push(form_field(&fixture.home_form, pick));
        record.push(form_field(&fixture.away_form, pick));
    }
    record
}

pub fn write_csv<W: Write>(batch: &EnrichmentBatch, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_COLUMNS)?;
    for fixture in &batch.fixtures {
        writer.write_record(csv_record(fixture))?;
    }
    writer.flush()?;
    Ok(())
}

pub async fn show_form(config: &Config, team_id: TeamId, limit: Option<usize>) -> Result<()> {
    let enricher = Enricher::from_config(config)?;
    let limit = limit.unwrap_or(config.enrichment.form_limit);

    println!("🔍 Computing form for team {} (last {} matches)...", team_id, limit);
    let form = enricher.forms().compute_form(team_id, limit).await?;
    print_form(&form);
    Ok(())
}

fn print_form(form: &TeamForm) {
    if form.matches.is_empty() {
        println!("📭 No completed matches found");
        return;
    }

    println!("\n📊 Form: {}", form.form);
    println!("   Goals for: {}", form.display.goals_for);
    println!("   Goals against: {}", form.display.goals_against);
    println!("   Corners: {}", form.display.corners);
    println!("   Cards: {}", form.display.cards);
    println!("   Shots: {} ({} on target)", form.display.shots_total, form.display.shots_on_target);

    println!("\n📅 Recent Matches:");
    for summary in &form.summaries {
        println!("   {}", summary);
    }
}

pub async fn show_rank(config: &Config, competition_id: CompetitionId, team_id: TeamId) -> Result<()> {
    let enricher = Enricher::from_config(config)?;
    let standing = enricher.standings().lookup_rank(competition_id, team_id).await;

    println!(
        "🏆 Team {} in {}: {}",
        team_id,
        config.enrichment.competition_name(competition_id),
        standing.label()
    );
    Ok(())
}

pub async fn show_live(config: &Config, query: &str) -> Result<()> {
    let scraper = WebScraper::new(config.scrape.clone(), config.enrichment.call_timeout())?;
    let service = LiveService::new(
        Arc::new(scraper),
        config.scrape.live_query_suffix.clone(),
        config.scrape.selector_timeout() + config.enrichment.call_timeout(),
    );

    println!("📡 Looking up live data for '{}'...", query);
    match service.live_status(query).await {
        LiveStatus::Live { snapshot } => {
            println!("🔴 Live");
            print_snapshot(&snapshot);
        }
        LiveStatus::NotLive { snapshot } => {
            println!("⏸️  Not live");
            print_snapshot(&snapshot);
        }
        LiveStatus::Unknown => println!("❓ No live panel found"),
    }
    Ok(())
}

fn print_snapshot(snapshot: &LiveMatchSnapshot) {
    println!("   Score: {}", snapshot.score_label());
    println!("   Time: {}", snapshot.phase_label());
    println!("   Corners: {}", LiveMatchSnapshot::count_label(snapshot.corners));
    println!("   Shots: {}", LiveMatchSnapshot::count_label(snapshot.shots));
    println!("   Yellow cards: {}", LiveMatchSnapshot::count_label(snapshot.cards));
}
