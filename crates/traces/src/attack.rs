use std::collections::HashMap;
use std::path::Path;

use crate::{AttackFileError, Cancellation, Footprint, LinkTable, Result, TraceReader};

struct Bucket {
    user_id: String,
    week: String,
    lat: f64,
    lon: f64,
}

/// Per (user, ISO week) sums of latitude and longitude, in first-seen order.
fn weekly_sums(path: &Path, cancel: &Cancellation) -> Result<Vec<Bucket>> {
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for row in TraceReader::open(path)?.watched(cancel) {
        let (line, row) = row?;
        if row.is_deleted() {
            continue;
        }
        let week = row.week(line)?;
        let (lat, lon) = row.trailing_position(line)?;

        let key = (row.user_id().to_string(), week);
        let idx = match index.get(&key) {
            Some(&i) => i,
            None => {
                buckets.push(Bucket {
                    user_id: key.0.clone(),
                    week: key.1.clone(),
                    lat: 0.0,
                    lon: 0.0,
                });
                index.insert(key, buckets.len() - 1);
                buckets.len() - 1
            }
        };
        buckets[idx].lat += lat;
        buckets[idx].lon += lon;
    }

    Ok(buckets)
}

/// Links every original (user, week) to the anonymized bucket whose summed
/// coordinates are closest in L1 distance. Ties go to the first bucket seen.
pub fn naive_guesses(original: &Path, anonymized: &Path, cancel: &Cancellation) -> Result<LinkTable> {
    let originals = weekly_sums(original, cancel)?;
    let candidates = weekly_sums(anonymized, cancel)?;

    let mut guesses = LinkTable::new();
    for (i, o) in originals.iter().enumerate() {
        cancel.check_row(i + 1)?;
        let mut best: Option<&Bucket> = None;
        let mut min_distance = f64::INFINITY;
        for c in &candidates {
            let d = (o.lat - c.lat).abs() + (o.lon - c.lon).abs();
            if d < min_distance {
                min_distance = d;
                best = Some(c);
            }
        }
        let guess = best.map(|b| b.user_id.clone()).unwrap_or_default();
        guesses
            .entry(o.user_id.clone())
            .or_default()
            .insert(o.week.clone(), vec![guess]);
    }
    Ok(guesses)
}

/// Fraction of footprint weeks the naive linkage attacker gets right.
pub fn score_naive_attack(
    original: &Path,
    shuffled: &Path,
    footprint: &Footprint,
    cancel: &Cancellation,
) -> Result<f64> {
    let guesses = naive_guesses(original, shuffled, cancel)?;

    let total = footprint.entry_count();
    if total == 0 {
        return Ok(0.0);
    }

    let correct = footprint
        .table()
        .iter()
        .flat_map(|(user, weeks)| weeks.iter().map(move |(week, ids)| (user, week, ids)))
        .filter(|(user, week, ids)| {
            let guessed = guesses
                .get(*user)
                .and_then(|w| w.get(*week))
                .and_then(|g| g.first());
            matches!((ids.first(), guessed), (Some(t), Some(g)) if t == g)
        })
        .count();

    Ok(correct as f64 / total as f64)
}

/// Grades a team's attack file. Each week scores `1/len(candidates)` when the
/// true id is among the candidates; missing weeks score 0.
pub fn grade_attack(footprint: &Footprint, guesses: &LinkTable) -> std::result::Result<f64, AttackFileError> {
    let mut score = 0.0;
    let mut score_max = 0usize;

    for (user, weeks) in footprint.table() {
        let guessed_weeks = guesses
            .get(user)
            .ok_or_else(|| AttackFileError::MissingIdentifier(user.clone()))?;

        for (week, ids) in weeks {
            score_max += 1;
            let (Some(valid), Some(candidates)) = (ids.first(), guessed_weeks.get(week)) else {
                continue;
            };
            if candidates.contains(valid) {
                score += 1.0 / candidates.len() as f64;
            }
        }
    }

    Ok(if score_max > 0 { score / score_max as f64 } else { 0.0 })
}
