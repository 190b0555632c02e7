use standings::{compute_team_ranking, rank_teams, AttackAttempt, SubmissionScore};
use uuid::Uuid;

fn submission(team: &str, utility: f64, is_published: bool) -> SubmissionScore {
    SubmissionScore {
        submission_id: Uuid::new_v4(),
        team: team.to_string(),
        utility,
        is_published,
    }
}

fn attack(team: &str, target: &SubmissionScore, score: f64) -> AttackAttempt {
    AttackAttempt {
        score,
        team: team.to_string(),
        target: target.submission_id,
    }
}

#[test]
fn test_defense_discounts_best_attack_and_attack_takes_weakest_target() {
    let s1 = submission("alpha", 0.8, true);
    let s2 = submission("beta", 0.6, true);
    let s3 = submission("beta", 0.9, false);
    let s4 = submission("gamma", 0.7, false);

    let attacks = vec![
        attack("beta", &s1, 0.5),
        attack("beta", &s1, 0.25),
        attack("alpha", &s2, 0.4),
        attack("alpha", &s3, 0.9),
        attack("alpha", &s4, 0.9),
    ];
    let subs = vec![s1, s2, s3, s4];

    let board = compute_team_ranking(&subs, &attacks);
    assert_eq!(board.len(), 3);

    assert_eq!(board[0].team, "beta");
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].defense_score, 0.36);
    assert_eq!(board[0].attack_score, 0.5);
    assert_eq!(board[0].total_score, 0.43);

    assert_eq!(board[1].team, "alpha");
    assert_eq!(board[1].defense_score, 0.4);
    assert_eq!(board[1].attack_score, 0.4);
    assert_eq!(board[1].total_score, 0.4);

    // gamma only has an unpublished submission and never attacked.
    assert_eq!(board[2].team, "gamma");
    assert_eq!(board[2].rank, 3);
    assert_eq!(board[2].defense_score, 0.0);
    assert_eq!(board[2].attack_score, 0.0);
    assert_eq!(board[2].total_score, 0.0);
}

#[test]
fn test_attack_score_sums_over_teams_and_uses_minimum_per_team() {
    let b1 = submission("beta", 0.5, true);
    let b2 = submission("beta", 0.5, true);
    let c1 = submission("gamma", 0.5, true);
    let attacks = vec![attack("alpha", &b1, 0.8), attack("alpha", &c1, 0.3)];
    let subs = vec![b1, b2, c1];

    let board = compute_team_ranking(&subs, &attacks);
    let alpha = board.iter().find(|s| s.team == "alpha").unwrap();
    // beta's b2 was never attacked by alpha, so beta contributes 0.
    assert_eq!(alpha.attack_score, 0.3);
    assert_eq!(alpha.defense_score, 0.0);
    assert_eq!(alpha.total_score, 0.15);
}

#[test]
fn test_idle_roster_team_scores_zero() {
    let roster = vec!["alpha".to_string(), "delta".to_string()];
    let s = submission("alpha", 0.25, true);
    let board = rank_teams(&roster, &[s], &[]);

    assert_eq!(board[0].team, "alpha");
    assert_eq!(board[0].defense_score, 0.25);
    assert_eq!(board[0].total_score, 0.125);
    assert_eq!(board[1].team, "delta");
    assert_eq!(board[1].total_score, 0.0);
}
