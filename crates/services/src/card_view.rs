use course_core::model::{
    Card, CardId, CardKind, ChecklistItem, ChecklistStats, CompletionLookup, ContentSection,
};

use crate::checklist_store::ChecklistStore;
use crate::progress_store::ProgressStore;

/// Presentation-agnostic state of one checklist item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItemView {
    pub index: usize,
    pub text: String,
    pub completed: bool,
}

/// One section of a card's content with its local progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionView {
    Text(String),
    Checklist {
        items: Vec<ChecklistItemView>,
        stats: ChecklistStats,
    },
}

/// Everything a detail view needs to render a card.
///
/// Not a UI view-model: no formatting, no localisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub card_id: CardId,
    pub title: String,
    pub description: Option<String>,
    pub kind: CardKind,
    pub bonus: bool,
    pub completed: bool,
    pub checklist: ChecklistStats,
    pub sections: Vec<SectionView>,
}

impl CardView {
    #[must_use]
    pub fn build(card: &Card, progress: &ProgressStore, checklist: &ChecklistStore) -> Self {
        let id = card.id();
        let sections = card
            .sections()
            .into_iter()
            .map(|section| match section {
                ContentSection::Text(text) => SectionView::Text(text),
                ContentSection::Checklist { offset, items } => SectionView::Checklist {
                    stats: checklist.section_progress(id, offset, items.len()),
                    items: items
                        .into_iter()
                        .map(|item| item_view(id, item, checklist))
                        .collect(),
                },
            })
            .collect();

        Self {
            card_id: id.clone(),
            title: card.title().to_owned(),
            description: card.description().map(str::to_owned),
            kind: card.kind(),
            bonus: card.is_bonus(),
            completed: progress.is_completed(id),
            checklist: checklist.card_progress(id, card.checklist_len()),
            sections,
        }
    }
}

fn item_view(card_id: &CardId, item: ChecklistItem, checklist: &ChecklistStore) -> ChecklistItemView {
    ChecklistItemView {
        completed: checklist.is_item_completed(card_id, item.index),
        index: item.index,
        text: item.text,
    }
}
