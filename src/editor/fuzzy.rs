//! Fuzzy Scoring
//!
//! Subsequence matching with position bonuses, used to rank completion
//! candidates and history search results. Constants: start-of-string +16,
//! after a separator +12, consecutive with the previous match +8, plus a
//! base point per matched character and −1 per skipped character.

const BONUS_START: i64 = 16;
const BONUS_BOUNDARY: i64 = 12;
const BONUS_CONSECUTIVE: i64 = 8;
const GAP_PENALTY: i64 = 1;

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '/' | '.' | '-' | '_' | ':')
}

/// Score a query against a candidate; None when the query is not a
/// subsequence. Matching is case-insensitive on the candidate side.
pub fn score(query: &str, candidate: &str) -> Option<i64> {
    if query.is_empty() {
        return Some(0);
    }

    let query: Vec<char> = query.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    let mut total: i64 = 0;
    let mut qi = 0;
    let mut last_match: Option<usize> = None;

    for (ci, &c) in candidate.iter().enumerate() {
        if qi >= query.len() {
            break;
        }
        let q = query[qi];
        let matched = c == q || c.to_lowercase().eq(q.to_lowercase());
        if matched {
            total += 1;
            if ci == 0 {
                total += BONUS_START;
            } else if is_separator(candidate[ci - 1]) {
                total += BONUS_BOUNDARY;
            }
            if last_match == Some(ci.wrapping_sub(1)) && ci > 0 {
                total += BONUS_CONSECUTIVE;
            }
            last_match = Some(ci);
            qi += 1;
        } else if last_match.is_some() {
            total -= GAP_PENALTY;
        }
    }

    if qi == query.len() {
        Some(total)
    } else {
        None
    }
}

/// Rank candidates by descending score, ties broken lexicographically.
pub fn rank<'a>(query: &str, candidates: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut scored: Vec<(i64, &str)> = candidates
        .filter_map(|c| score(query, c).map(|s| (s, c)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, c)| c.to_string()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsequence_required() {
        assert!(score("abc", "a1b2c3").is_some());
        assert!(score("abc", "acb").is_none());
        assert!(score("", "anything") == Some(0));
    }

    #[test]
    fn consecutive_beats_scattered() {
        let tight = score("git", "git").unwrap();
        let scattered = score("git", "grantiotools").unwrap();
        assert!(tight > scattered);
    }

    #[test]
    fn start_of_string_beats_interior() {
        let start = score("log", "logger").unwrap();
        let interior = score("log", "catalog").unwrap();
        assert!(start > interior);
    }

    #[test]
    fn boundary_bonus_applies() {
        let boundary = score("rs", "read-state").unwrap();
        let interior = score("rs", "parser").unwrap();
        assert!(boundary > interior);
    }

    #[test]
    fn case_insensitive_on_candidate() {
        assert!(score("readme", "README.md").is_some());
    }

    #[test]
    fn ranking_order() {
        let candidates = ["checkout", "cherry-pick", "check-ignore", "commit"];
        let ranked = rank("ch", candidates.iter().copied());
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0], "check-ignore");
        // Equal-scoring names stay lexicographic.
        assert!(ranked.contains(&"checkout".to_string()));
        assert!(ranked.contains(&"cherry-pick".to_string()));
    }
}
