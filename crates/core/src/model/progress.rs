use std::collections::HashMap;

use crate::model::ids::CardId;

/// `round(100 * completed / total)` with halves rounded up; 0 when `total` is 0.
#[must_use]
pub fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    let pct = (200 * completed + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

/// Read access to per-card completion, shared by the stores and the unlock
/// evaluator.
pub trait CompletionLookup {
    fn is_completed(&self, card: &CardId) -> bool;

    /// Percentage of completed cards among `cards`.
    fn completion_percentage<'a, I>(&self, cards: I) -> u8
    where
        I: IntoIterator<Item = &'a CardId>,
        Self: Sized,
    {
        let mut total = 0usize;
        let mut done = 0usize;
        for card in cards {
            total += 1;
            if self.is_completed(card) {
                done += 1;
            }
        }
        completion_percentage(done, total)
    }
}

/// Card completion for one user. Missing keys mean "not completed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressMap {
    cards: HashMap<CardId, bool>,
}

impl ProgressMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, card: &CardId) -> bool {
        self.cards.get(card).copied().unwrap_or(false)
    }

    /// Sets a value and returns the one it replaced (default false).
    pub fn set(&mut self, card: CardId, completed: bool) -> bool {
        self.cards.insert(card, completed).unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.cards.values().filter(|v| **v).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl CompletionLookup for ProgressMap {
    fn is_completed(&self, card: &CardId) -> bool {
        self.get(card)
    }
}

impl FromIterator<(CardId, bool)> for ProgressMap {
    fn from_iter<T: IntoIterator<Item = (CardId, bool)>>(iter: T) -> Self {
        Self {
            cards: iter.into_iter().collect(),
        }
    }
}

/// Completion counts for a card's checklist (or one section of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistStats {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

impl ChecklistStats {
    #[must_use]
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            completed,
            total,
            percentage: completion_percentage(completed, total),
        }
    }
}

/// Per-item checklist completion keyed by card, then item index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecklistMap {
    cards: HashMap<CardId, HashMap<usize, bool>>,
}

impl ChecklistMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, card: &CardId, index: usize) -> bool {
        self.cards
            .get(card)
            .and_then(|items| items.get(&index))
            .copied()
            .unwrap_or(false)
    }

    /// Sets a value and returns the one it replaced (default false).
    pub fn set(&mut self, card: CardId, index: usize, completed: bool) -> bool {
        self.cards
            .entry(card)
            .or_default()
            .insert(index, completed)
            .unwrap_or(false)
    }

    /// Replaces everything stored for one card.
    pub fn replace_card(&mut self, card: CardId, items: HashMap<usize, bool>) {
        self.cards.insert(card, items);
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    /// Counts completed indices within `range`.
    #[must_use]
    pub fn completed_in(&self, card: &CardId, range: std::ops::Range<usize>) -> usize {
        self.cards.get(card).map_or(0, |items| {
            items
                .iter()
                .filter(|(idx, done)| **done && range.contains(idx))
                .count()
        })
    }

    /// Progress over the first `total_items` indices of a card.
    #[must_use]
    pub fn stats(&self, card: &CardId, total_items: usize) -> ChecklistStats {
        ChecklistStats::new(self.completed_in(card, 0..total_items), total_items)
    }
}
