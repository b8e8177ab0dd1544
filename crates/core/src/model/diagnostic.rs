use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiagnosticError {
    #[error("unknown criterion: {0}")]
    UnknownCriterion(String),

    #[error("unknown next step: {0}")]
    UnknownNextStep(String),

    #[error("invalid level: {0}")]
    InvalidLevel(String),
}

//
// ─── CRITERIA ──────────────────────────────────────────────────────────────────
//

/// Self-assessed strength for one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Weak,
    Medium,
    Strong,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Weak => "weak",
            Level::Medium => "medium",
            Level::Strong => "strong",
        }
    }

    /// # Errors
    ///
    /// Returns `DiagnosticError::InvalidLevel` for unknown labels.
    pub fn parse(raw: &str) -> Result<Self, DiagnosticError> {
        match raw.trim().to_lowercase().as_str() {
            "weak" => Ok(Level::Weak),
            "medium" => Ok(Level::Medium),
            "strong" => Ok(Level::Strong),
            other => Err(DiagnosticError::InvalidLevel(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub id: &'static str,
    pub name: &'static str,
    /// Option labels ordered weak, medium, strong.
    pub options: [&'static str; 3],
}

pub const CRITERIA: [Criterion; 6] = [
    Criterion {
        id: "academic_background",
        name: "Academic background",
        options: [
            "I have not finished my undergraduate degree yet",
            "I have a degree, but unrelated to the master's topic",
            "I have a solid degree consistent with the field",
        ],
    },
    Criterion {
        id: "professional_experience",
        name: "Professional experience",
        options: [
            "I have never worked in the field",
            "I have experience, but no clear link to research",
            "My experience is directly tied to the topic",
        ],
    },
    Criterion {
        id: "scientific_output",
        name: "Scientific output",
        options: [
            "I have no publications",
            "I have abstracts or conference papers",
            "I have articles published in journals",
        ],
    },
    Criterion {
        id: "research_experience",
        name: "Research experience",
        options: [
            "I have never joined a research project",
            "I took part in undergraduate research or a research group",
            "My undergraduate research produced published results",
        ],
    },
    Criterion {
        id: "teaching_experience",
        name: "Teaching experience",
        options: [
            "I have no teaching experience",
            "I was a teaching assistant or tutor",
            "I have solid teaching experience",
        ],
    },
    Criterion {
        id: "languages",
        name: "Languages and qualifications",
        options: [
            "I do not speak another language",
            "I have intermediate English",
            "I hold a proficiency certificate",
        ],
    },
];

pub const NEXT_STEPS: [(&str, &str); 3] = [
    ("gaps_identified", "I identified my biggest gaps"),
    ("priorities_chosen", "I chose 3 priorities to improve"),
    ("ready_for_builder", "I am ready for the builder"),
];

#[must_use]
pub fn criterion(id: &str) -> Option<&'static Criterion> {
    CRITERIA.iter().find(|c| c.id == id)
}

/// Overall band derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Weak,
    Medium,
    Strong,
}

impl ScoreBand {
    #[must_use]
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=2 => ScoreBand::Weak,
            3..=4 => ScoreBand::Medium,
            _ => ScoreBand::Strong,
        }
    }

    #[must_use]
    pub fn headline(self) -> &'static str {
        match self {
            ScoreBand::Weak => "Weak résumé: needs significant strengthening",
            ScoreBand::Medium => "Average résumé: good foundations, still needs to grow",
            ScoreBand::Strong => "Strong résumé: you are well positioned",
        }
    }
}

//
// ─── DIAGNOSTIC ────────────────────────────────────────────────────────────────
//

/// A user's answers to the self-diagnostic quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    responses: BTreeMap<String, Level>,
    next_steps: Vec<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts, dropping ids this build no longer knows.
    #[must_use]
    pub fn from_persisted(responses: BTreeMap<String, Level>, next_steps: Vec<String>) -> Self {
        let responses = responses
            .into_iter()
            .filter(|(id, _)| criterion(id).is_some())
            .collect();
        let mut steps: Vec<String> = Vec::new();
        for step in next_steps {
            if NEXT_STEPS.iter().any(|(id, _)| *id == step) && !steps.contains(&step) {
                steps.push(step);
            }
        }
        Self {
            responses,
            next_steps: steps,
        }
    }

    /// # Errors
    ///
    /// Returns `DiagnosticError::UnknownCriterion` for ids outside [`CRITERIA`].
    pub fn answer(&mut self, criterion_id: &str, level: Level) -> Result<(), DiagnosticError> {
        let criterion = criterion(criterion_id)
            .ok_or_else(|| DiagnosticError::UnknownCriterion(criterion_id.to_owned()))?;
        self.responses.insert(criterion.id.to_owned(), level);
        Ok(())
    }

    /// Sets or clears a next-step acknowledgement. Repeating the same
    /// request is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosticError::UnknownNextStep` for ids outside [`NEXT_STEPS`].
    pub fn set_next_step(&mut self, step_id: &str, selected: bool) -> Result<(), DiagnosticError> {
        let present = self.next_steps.iter().any(|s| s == step_id);
        if present != selected {
            self.toggle_next_step(step_id)?;
        } else if !NEXT_STEPS.iter().any(|(id, _)| *id == step_id) {
            return Err(DiagnosticError::UnknownNextStep(step_id.to_owned()));
        }
        Ok(())
    }

    /// Flips a next-step acknowledgement; returns whether it is now set.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosticError::UnknownNextStep` for ids outside [`NEXT_STEPS`].
    pub fn toggle_next_step(&mut self, step_id: &str) -> Result<bool, DiagnosticError> {
        if !NEXT_STEPS.iter().any(|(id, _)| *id == step_id) {
            return Err(DiagnosticError::UnknownNextStep(step_id.to_owned()));
        }
        if let Some(pos) = self.next_steps.iter().position(|s| s == step_id) {
            self.next_steps.remove(pos);
            Ok(false)
        } else {
            self.next_steps.push(step_id.to_owned());
            Ok(true)
        }
    }

    #[must_use]
    pub fn level(&self, criterion_id: &str) -> Option<Level> {
        self.responses.get(criterion_id).copied()
    }

    #[must_use]
    pub fn responses(&self) -> &BTreeMap<String, Level> {
        &self.responses
    }

    #[must_use]
    pub fn next_steps(&self) -> &[String] {
        &self.next_steps
    }

    /// Number of criteria answered as strong.
    #[must_use]
    pub fn score(&self) -> u32 {
        let strong = self.responses.values().filter(|l| **l == Level::Strong).count();
        u32::try_from(strong).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.score())
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        CRITERIA.iter().all(|c| self.responses.contains_key(c.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered(strong: usize) -> Diagnostic {
        let mut diag = Diagnostic::new();
        for (i, c) in CRITERIA.iter().enumerate() {
            let level = if i < strong { Level::Strong } else { Level::Medium };
            diag.answer(c.id, level).unwrap();
        }
        diag
    }

    #[test]
    fn band_thresholds() {
        assert_eq!(answered(2).band(), ScoreBand::Weak);
        assert_eq!(answered(3).band(), ScoreBand::Medium);
        assert_eq!(answered(4).band(), ScoreBand::Medium);
        assert_eq!(answered(5).band(), ScoreBand::Strong);
        assert_eq!(answered(6).score(), 6);
    }

    #[test]
    fn completeness_requires_every_criterion() {
        let mut diag = Diagnostic::new();
        diag.answer("languages", Level::Weak).unwrap();
        assert!(!diag.is_complete());
        assert!(answered(0).is_complete());
    }

    #[test]
    fn unknown_criterion_is_rejected() {
        let mut diag = Diagnostic::new();
        let err = diag.answer("charisma", Level::Strong).unwrap_err();
        assert_eq!(err, DiagnosticError::UnknownCriterion("charisma".into()));
    }

    #[test]
    fn next_steps_toggle() {
        let mut diag = Diagnostic::new();
        assert!(diag.toggle_next_step("gaps_identified").unwrap());
        assert!(!diag.toggle_next_step("gaps_identified").unwrap());
        assert!(diag.next_steps().is_empty());
        assert!(diag.toggle_next_step("nap").is_err());
    }

    #[test]
    fn set_next_step_is_idempotent() {
        let mut diag = Diagnostic::new();
        diag.set_next_step("priorities_chosen", true).unwrap();
        diag.set_next_step("priorities_chosen", true).unwrap();
        assert_eq!(diag.next_steps(), ["priorities_chosen".to_string()]);

        diag.set_next_step("priorities_chosen", false).unwrap();
        diag.set_next_step("priorities_chosen", false).unwrap();
        assert!(diag.next_steps().is_empty());
        assert!(diag.set_next_step("nap", false).is_err());
    }

    #[test]
    fn from_persisted_drops_unknown_ids() {
        let mut responses = BTreeMap::new();
        responses.insert("languages".to_string(), Level::Strong);
        responses.insert("retired".to_string(), Level::Weak);
        let diag = Diagnostic::from_persisted(
            responses,
            vec!["ready_for_builder".into(), "ready_for_builder".into(), "x".into()],
        );
        assert_eq!(diag.responses().len(), 1);
        assert_eq!(diag.next_steps(), ["ready_for_builder".to_string()]);
    }

    #[test]
    fn level_parse_is_lenient_on_case() {
        assert_eq!(Level::parse(" Strong ").unwrap(), Level::Strong);
        assert!(Level::parse("meh").is_err());
    }
}
