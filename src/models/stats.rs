use serde::Serialize;

/// Aggregate statistics over a user's watchlist
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WatchStats {
    pub total: usize,
    pub watching: usize,
    pub completed: usize,
    pub on_hold: usize,
    pub dropped: usize,
    pub plan_to_watch: usize,
    /// Sum of episode progress across all entries
    pub episodes_watched: i64,
    /// Mean over scored entries only
    pub mean_score: Option<f64>,
    /// Genre frequency, most common first
    pub genres: Vec<GenreCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenreCount {
    pub genre: String,
    pub count: usize,
}
