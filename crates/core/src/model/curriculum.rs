use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::checklist::{self, ContentSection};
use crate::model::ids::{CardId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("curriculum must contain at least one module")]
    Empty,

    #[error("module {0} has an empty title")]
    EmptyModuleTitle(ModuleId),

    #[error("card {0} has an empty title")]
    EmptyCardTitle(CardId),

    #[error("duplicate module id: {0}")]
    DuplicateModule(ModuleId),

    #[error("duplicate card id: {0}")]
    DuplicateCard(CardId),

    #[error("card {card} has an invalid external url: {raw}")]
    InvalidUrl { card: CardId, raw: String },

    #[error("curriculum json is malformed: {0}")]
    Malformed(String),
}

//
// ─── CARDS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Video,
    Text,
    Checklist,
    Form,
    Link,
}

impl CardKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardKind::Video => "video",
            CardKind::Text => "text",
            CardKind::Checklist => "checklist",
            CardKind::Form => "form",
            CardKind::Link => "link",
        }
    }
}

/// A single unit of curriculum content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    id: CardId,
    title: String,
    description: Option<String>,
    kind: CardKind,
    content: Option<String>,
    external_url: Option<Url>,
}

impl Card {
    #[must_use]
    pub fn id(&self) -> &CardId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> CardKind {
        self.kind
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[must_use]
    pub fn external_url(&self) -> Option<&Url> {
        self.external_url.as_ref()
    }

    /// Bonus cards never block progression to the next module.
    #[must_use]
    pub fn is_bonus(&self) -> bool {
        let title = self.title.to_lowercase();
        title.contains("bônus") || title.contains("bonus")
    }

    #[must_use]
    pub fn checklist_len(&self) -> usize {
        self.content.as_deref().map_or(0, checklist::count_items)
    }

    #[must_use]
    pub fn sections(&self) -> Vec<ContentSection> {
        self.content.as_deref().map(checklist::split_sections).unwrap_or_default()
    }
}

//
// ─── MODULES ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
    position: usize,
    cards: Vec<Card>,
}

impl Module {
    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Zero-based ordinal of the module on the board.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card_ids(&self) -> impl Iterator<Item = &CardId> {
        self.cards.iter().map(Card::id)
    }

    /// Cards that gate the next module.
    pub fn required_card_ids(&self) -> impl Iterator<Item = &CardId> {
        self.cards.iter().filter(|c| !c.is_bonus()).map(Card::id)
    }
}

//
// ─── CURRICULUM ────────────────────────────────────────────────────────────────
//

/// The fixed, read-only course structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curriculum {
    modules: Vec<Module>,
}

impl Curriculum {
    /// Parse and validate a curriculum from its JSON description.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError::Malformed` for JSON that does not match the
    /// expected shape, or any validation error from [`CurriculumDraft::validate`].
    pub fn from_json(raw: &str) -> Result<Self, CurriculumError> {
        let draft: CurriculumDraft =
            serde_json::from_str(raw).map_err(|e| CurriculumError::Malformed(e.to_string()))?;
        draft.validate()
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, index: usize) -> Option<&Module> {
        self.modules.get(index)
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.modules.iter().flat_map(|m| m.cards.iter())
    }

    /// Every card id in board order, bonus cards included.
    pub fn card_ids(&self) -> impl Iterator<Item = &CardId> {
        self.cards().map(Card::id)
    }

    #[must_use]
    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards().find(|c| c.id() == id)
    }

    /// Index of the module holding the given card.
    #[must_use]
    pub fn module_index_of(&self, id: &CardId) -> Option<usize> {
        self.modules
            .iter()
            .position(|m| m.cards.iter().any(|c| c.id() == id))
    }

    /// First card of the first module, the default onboarding card.
    #[must_use]
    pub fn first_card(&self) -> Option<&Card> {
        self.modules.first().and_then(|m| m.cards.first())
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurriculumDraft {
    pub modules: Vec<ModuleDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDraft {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cards: Vec<CardDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardDraft {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", alias = "kind")]
    pub kind: CardKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "externalUrl", alias = "external_url")]
    pub external_url: Option<String>,
}

impl CurriculumDraft {
    /// Validate ids, titles and links, assigning module positions in order.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` on empty input, blank titles, duplicate ids
    /// or unparsable external URLs.
    pub fn validate(self) -> Result<Curriculum, CurriculumError> {
        if self.modules.is_empty() {
            return Err(CurriculumError::Empty);
        }

        let mut module_ids = HashSet::new();
        let mut card_ids = HashSet::new();
        let mut modules = Vec::with_capacity(self.modules.len());

        for (position, draft) in self.modules.into_iter().enumerate() {
            let id = ModuleId::new(draft.id.trim());
            if draft.title.trim().is_empty() {
                return Err(CurriculumError::EmptyModuleTitle(id));
            }
            if !module_ids.insert(id.clone()) {
                return Err(CurriculumError::DuplicateModule(id));
            }

            let mut cards = Vec::with_capacity(draft.cards.len());
            for card in draft.cards {
                let card = card.validate()?;
                if !card_ids.insert(card.id.clone()) {
                    return Err(CurriculumError::DuplicateCard(card.id));
                }
                cards.push(card);
            }

            modules.push(Module {
                id,
                title: draft.title.trim().to_owned(),
                position,
                cards,
            });
        }

        Ok(Curriculum { modules })
    }
}

impl CardDraft {
    fn validate(self) -> Result<Card, CurriculumError> {
        let id = CardId::new(self.id.trim());
        if self.title.trim().is_empty() {
            return Err(CurriculumError::EmptyCardTitle(id));
        }
        let external_url = match normalize_optional(self.external_url) {
            Some(raw) => Some(Url::parse(&raw).map_err(|_| CurriculumError::InvalidUrl {
                card: id.clone(),
                raw,
            })?),
            None => None,
        };

        Ok(Card {
            id,
            title: self.title.trim().to_owned(),
            description: normalize_optional(self.description),
            kind: self.kind,
            content: self.content.filter(|c| !c.trim().is_empty()),
            external_url,
        })
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "modules": [
            { "id": "instructions", "title": "How to use", "cards": [
                { "id": "inst-1", "title": "Instructions", "type": "text", "content": "Read me" }
            ]},
            { "id": "diagnostic", "title": "Choosing a program", "cards": [
                { "id": "ppg-tasks", "title": "Tasks", "type": "checklist",
                  "content": "- [ ] one\n- [ ] two" },
                { "id": "ppg-advisor", "title": "🎯 BÔNUS: Advisor", "type": "text" },
                { "id": "ppg-link", "title": "Portal", "type": "link",
                  "externalUrl": "https://example.org/portal" }
            ]}
        ]
    }"#;

    #[test]
    fn parses_modules_in_order() {
        let curriculum = Curriculum::from_json(JSON).unwrap();
        assert_eq!(curriculum.modules().len(), 2);
        assert_eq!(curriculum.modules()[1].position(), 1);
        assert_eq!(curriculum.first_card().unwrap().id().as_str(), "inst-1");
        assert_eq!(curriculum.module_index_of(&CardId::new("ppg-link")), Some(1));
    }

    #[test]
    fn card_ids_span_every_module_in_order() {
        let curriculum = Curriculum::from_json(JSON).unwrap();
        let ids: Vec<&str> = curriculum.card_ids().map(CardId::as_str).collect();
        assert_eq!(ids, ["inst-1", "ppg-tasks", "ppg-advisor", "ppg-link"]);
    }

    #[test]
    fn bonus_detection_is_case_insensitive() {
        let curriculum = Curriculum::from_json(JSON).unwrap();
        let advisor = curriculum.card(&CardId::new("ppg-advisor")).unwrap();
        assert!(advisor.is_bonus());
        let required: Vec<_> = curriculum.modules()[1].required_card_ids().collect();
        assert_eq!(required.len(), 2);
    }

    #[test]
    fn checklist_len_is_derived_from_content() {
        let curriculum = Curriculum::from_json(JSON).unwrap();
        let tasks = curriculum.card(&CardId::new("ppg-tasks")).unwrap();
        assert_eq!(tasks.checklist_len(), 2);
        assert_eq!(checklist::extract_items(tasks.content().unwrap())[1].text, "two");
        let link = curriculum.card(&CardId::new("ppg-link")).unwrap();
        assert_eq!(link.checklist_len(), 0);
        assert_eq!(link.external_url().unwrap().host_str(), Some("example.org"));
    }

    #[test]
    fn rejects_duplicate_card_ids_across_modules() {
        let json = r#"{"modules": [
            {"id": "a", "title": "A", "cards": [{"id": "x", "title": "X", "type": "text"}]},
            {"id": "b", "title": "B", "cards": [{"id": "x", "title": "Y", "type": "video"}]}
        ]}"#;
        let err = Curriculum::from_json(json).unwrap_err();
        assert_eq!(err, CurriculumError::DuplicateCard(CardId::new("x")));
    }

    #[test]
    fn rejects_invalid_url() {
        let json = r#"{"modules": [
            {"id": "a", "title": "A", "cards": [
                {"id": "x", "title": "X", "type": "link", "externalUrl": "not a url"}
            ]}
        ]}"#;
        assert!(matches!(
            Curriculum::from_json(json),
            Err(CurriculumError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_empty_curriculum() {
        let err = Curriculum::from_json(r#"{"modules": []}"#).unwrap_err();
        assert_eq!(err, CurriculumError::Empty);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            Curriculum::from_json("{"),
            Err(CurriculumError::Malformed(_))
        ));
    }
}
