use std::collections::HashMap;

/// A measured bit string and how often it was observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub bits: String,
    pub hits: u64,
}

/// Outcome frequency table that remembers first-observation order.
///
/// The order matters: candidates with equal frequency rank by which was seen
/// first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Counts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `hits` observations of `outcome`.
    pub fn record(&mut self, outcome: &str, hits: u64) {
        match self.index.get(outcome) {
            Some(&pos) => self.entries[pos].1 += hits,
            None => {
                self.index.insert(outcome.to_string(), self.entries.len());
                self.entries.push((outcome.to_string(), hits));
            }
        }
    }

    pub fn get(&self, outcome: &str) -> u64 {
        self.index
            .get(outcome)
            .map(|&pos| self.entries[pos].1)
            .unwrap_or(0)
    }

    /// Sum of all frequencies; equals the shot count for executor output.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, hits)| hits).sum()
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outcomes in first-observation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(bits, hits)| (bits.as_str(), *hits))
    }

    /// The `k` most frequent outcomes, descending; ties keep first-seen order.
    pub fn top_k(&self, k: usize) -> Vec<Candidate> {
        let mut ranked: Vec<&(String, u64)> = self.entries.iter().collect();
        // sort_by is stable, which gives the tie-break for free
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(k)
            .map(|(bits, hits)| Candidate {
                bits: bits.clone(),
                hits: *hits,
            })
            .collect()
    }
}

impl<S: AsRef<str>> FromIterator<(S, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for (outcome, hits) in iter {
            counts.record(outcome.as_ref(), hits);
        }
        counts
    }
}
