//! Scoreboard and final ranking
//!
//! Nothing is persisted: standings live for one game.

use serde::{Deserialize, Serialize};

use crate::sim::agent::PlayerId;

/// Live score display, sent to the presenter after every score change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    /// Current round, 1-based
    pub round: u32,
    /// Target round count (grows on ties)
    pub target_rounds: u32,
    pub scores: Vec<u32>,
    /// Players holding the top score; empty while everyone is at zero
    pub leaders: Vec<PlayerId>,
}

impl Scoreboard {
    pub fn new(round: u32, target_rounds: u32, scores: &[u32]) -> Self {
        let max = scores.iter().copied().max().unwrap_or(0);
        let leaders = if max > 0 {
            scores
                .iter()
                .enumerate()
                .filter(|&(_, &s)| s == max)
                .map(|(id, _)| id)
                .collect()
        } else {
            Vec::new()
        };
        Self {
            round,
            target_rounds,
            scores: scores.to_vec(),
            leaders,
        }
    }
}

/// A single ranked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub player: PlayerId,
    pub score: u32,
    /// Competition rank, 1-indexed; tied scores share a rank
    pub rank: usize,
}

/// Final ranking, sorted by descending score
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standings {
    pub entries: Vec<StandingEntry>,
}

impl Standings {
    /// Rank a score table (index = player id)
    pub fn from_scores(scores: &[u32]) -> Self {
        let mut order: Vec<(PlayerId, u32)> = scores.iter().copied().enumerate().collect();
        // Stable sort keeps player-id order among ties
        order.sort_by(|a, b| b.1.cmp(&a.1));

        let mut entries: Vec<StandingEntry> = Vec::with_capacity(order.len());
        for (i, (player, score)) in order.into_iter().enumerate() {
            let rank = match entries.last() {
                Some(prev) if prev.score == score => prev.rank,
                _ => i + 1,
            };
            entries.push(StandingEntry {
                player,
                score,
                rank,
            });
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u32> {
        self.entries.first().map(|e| e.score)
    }

    /// Players sharing first place
    pub fn winners(&self) -> Vec<PlayerId> {
        self.entries
            .iter()
            .filter(|e| e.rank == 1)
            .map(|e| e.player)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_competition_ranking() {
        let standings = Standings::from_scores(&[3, 5, 5, 1]);
        let ranks: Vec<(PlayerId, usize)> =
            standings.entries.iter().map(|e| (e.player, e.rank)).collect();
        assert_eq!(ranks, vec![(1, 1), (2, 1), (0, 3), (3, 4)]);
        assert_eq!(standings.winners(), vec![1, 2]);
        assert_eq!(standings.top_score(), Some(5));
    }

    #[test]
    fn test_all_zero_is_a_shared_first() {
        let standings = Standings::from_scores(&[0, 0]);
        assert_eq!(standings.winners(), vec![0, 1]);
    }

    #[test]
    fn test_empty_standings() {
        let standings = Standings::from_scores(&[]);
        assert!(standings.is_empty());
        assert_eq!(standings.top_score(), None);
    }

    #[test]
    fn test_scoreboard_leaders() {
        let board = Scoreboard::new(2, 5, &[1, 4, 4]);
        assert_eq!(board.leaders, vec![1, 2]);
        assert!(Scoreboard::new(1, 5, &[0, 0]).leaders.is_empty());
    }
}
