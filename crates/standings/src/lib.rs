//! Competition leaderboard.
//!
//! A team defends with its published submissions (utility discounted by the
//! strongest attack each one suffered) and attacks the other teams'.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TeamId = String;

/// The parts of an evaluated submission that ranking needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionScore {
    pub submission_id: Uuid,
    pub team: TeamId,
    pub utility: f64,
    pub is_published: bool,
}

/// One graded attack of `team` against `target`. Attempts are append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackAttempt {
    pub score: f64,
    pub team: TeamId,
    pub target: Uuid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamStanding {
    pub rank: usize,
    pub team: TeamId,
    pub defense_score: f64,
    pub attack_score: f64,
    pub total_score: f64,
}

/// Best attack by anyone (or by `team` only) against each submission.
fn best_attacks(attacks: &[AttackAttempt], team: Option<&str>) -> HashMap<Uuid, f64> {
    let mut best: HashMap<Uuid, f64> = HashMap::new();
    for a in attacks.iter().filter(|a| team.map_or(true, |t| a.team == t)) {
        let e = best.entry(a.target).or_insert(a.score);
        *e = e.max(a.score);
    }
    best
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Ranks every team appearing in `submissions` or `attacks`.
pub fn compute_team_ranking(submissions: &[SubmissionScore], attacks: &[AttackAttempt]) -> Vec<TeamStanding> {
    let roster: BTreeSet<&str> = submissions
        .iter()
        .map(|s| s.team.as_str())
        .chain(attacks.iter().map(|a| a.team.as_str()))
        .collect();
    let roster: Vec<TeamId> = roster.into_iter().map(str::to_string).collect();
    rank_teams(&roster, submissions, attacks)
}

/// Ranks an explicit roster; teams without activity score 0.
pub fn rank_teams(roster: &[TeamId], submissions: &[SubmissionScore], attacks: &[AttackAttempt]) -> Vec<TeamStanding> {
    let against_any = best_attacks(attacks, None);

    let mut published: HashMap<&str, Vec<&SubmissionScore>> = HashMap::new();
    for s in submissions.iter().filter(|s| s.is_published) {
        published.entry(s.team.as_str()).or_default().push(s);
    }

    let mut standings: Vec<TeamStanding> = roster
        .iter()
        .map(|team| {
            let defense = published
                .get(team.as_str())
                .into_iter()
                .flatten()
                .map(|s| (1.0 - against_any.get(&s.submission_id).copied().unwrap_or(0.0)) * s.utility)
                .fold(0.0, f64::max);

            let by_team = best_attacks(attacks, Some(team.as_str()));
            let attack: f64 = published
                .iter()
                .filter(|(other, _)| **other != team.as_str())
                .map(|(_, subs)| {
                    subs.iter()
                        .map(|s| by_team.get(&s.submission_id).copied().unwrap_or(0.0))
                        .fold(f64::INFINITY, f64::min)
                })
                .sum();

            let total = if defense > 0.0 || attack > 0.0 {
                (defense + attack) / 2.0
            } else {
                0.0
            };

            TeamStanding {
                rank: 0,
                team: team.clone(),
                defense_score: round4(defense),
                attack_score: round4(attack),
                total_score: round4(total),
            }
        })
        .collect();

    standings.sort_by(|a, b| b.total_score.total_cmp(&a.total_score).then_with(|| a.team.cmp(&b.team)));
    for (i, s) in standings.iter_mut().enumerate() {
        s.rank = i + 1;
    }
    standings
}
