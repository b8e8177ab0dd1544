//! Checklist extraction from card content.
//!
//! Items are addressed by their position in extraction order. Stored progress
//! rows carry that position only, so editing a card's checklist lines shifts
//! the meaning of previously stored indices.

const ITEM_PREFIX: &str = "- [";

/// One checklist line extracted from card content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub index: usize,
    pub text: String,
}

/// A maximal run of either prose or checklist lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSection {
    Text(String),
    Checklist {
        /// Global index of the first item in this section.
        offset: usize,
        items: Vec<ChecklistItem>,
    },
}

impl ContentSection {
    #[must_use]
    pub fn is_checklist(&self) -> bool {
        matches!(self, ContentSection::Checklist { .. })
    }
}

#[must_use]
pub fn is_checklist_line(line: &str) -> bool {
    line.trim_start().starts_with(ITEM_PREFIX)
}

/// Strips the `- [ ] ` / `- [x] ` marker from a checklist line.
#[must_use]
pub fn item_text(line: &str) -> String {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix(ITEM_PREFIX).unwrap_or(trimmed);
    let rest = match rest.char_indices().next() {
        Some((_, ' ' | 'x' | 'X')) if rest[1..].starts_with("] ") => &rest[3..],
        Some((_, ' ' | 'x' | 'X')) if rest[1..].starts_with(']') => &rest[2..],
        _ => trimmed,
    };
    rest.trim().to_owned()
}

/// All checklist items of `content`, in extraction order.
#[must_use]
pub fn extract_items(content: &str) -> Vec<ChecklistItem> {
    content
        .lines()
        .filter(|line| is_checklist_line(line))
        .enumerate()
        .map(|(index, line)| ChecklistItem {
            index,
            text: item_text(line),
        })
        .collect()
}

#[must_use]
pub fn count_items(content: &str) -> usize {
    content.lines().filter(|line| is_checklist_line(line)).count()
}

/// Splits content into alternating text and checklist sections.
///
/// Checklist offsets accumulate across sections so every item keeps the
/// same global index that `extract_items` assigns it.
#[must_use]
pub fn split_sections(content: &str) -> Vec<ContentSection> {
    let mut sections = Vec::new();
    let mut text: Vec<&str> = Vec::new();
    let mut items: Vec<ChecklistItem> = Vec::new();
    let mut next_index = 0usize;

    for line in content.lines() {
        if is_checklist_line(line) {
            if !text.is_empty() {
                sections.push(ContentSection::Text(text.join("\n")));
                text.clear();
            }
            items.push(ChecklistItem {
                index: next_index,
                text: item_text(line),
            });
            next_index += 1;
        } else {
            if !items.is_empty() {
                let offset = items[0].index;
                sections.push(ContentSection::Checklist {
                    offset,
                    items: std::mem::take(&mut items),
                });
            }
            text.push(line);
        }
    }

    if !text.is_empty() {
        sections.push(ContentSection::Text(text.join("\n")));
    }
    if !items.is_empty() {
        let offset = items[0].index;
        sections.push(ContentSection::Checklist { offset, items });
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = "# Tasks\nIntro line\n- [ ] Define goals\n- [x] Map programs\n\nMiddle text\n  - [ ] Talk to students\n";

    #[test]
    fn extracts_items_in_order_with_clean_text() {
        let items = extract_items(CONTENT);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].text, "Define goals");
        assert_eq!(items[1].text, "Map programs");
        assert_eq!(items[2].index, 2);
        assert_eq!(items[2].text, "Talk to students");
    }

    #[test]
    fn extraction_is_deterministic() {
        assert_eq!(extract_items(CONTENT), extract_items(CONTENT));
        assert_eq!(count_items(CONTENT), 3);
    }

    #[test]
    fn content_without_items_has_zero_count() {
        assert_eq!(count_items("just prose\n- a bullet"), 0);
        assert!(extract_items("").is_empty());
    }

    #[test]
    fn sections_carry_cumulative_offsets() {
        let sections = split_sections(CONTENT);
        let offsets: Vec<usize> = sections
            .iter()
            .filter_map(|s| match s {
                ContentSection::Checklist { offset, .. } => Some(*offset),
                ContentSection::Text(_) => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 2]);
        assert!(matches!(&sections[0], ContentSection::Text(t) if t.contains("Intro line")));
        assert!(sections[1].is_checklist());
    }

    #[test]
    fn trailing_checklist_is_flushed() {
        let sections = split_sections("- [ ] one\n- [ ] two");
        assert_eq!(sections.len(), 1);
        match &sections[0] {
            ContentSection::Checklist { offset, items } => {
                assert_eq!(*offset, 0);
                assert_eq!(items.len(), 2);
            }
            ContentSection::Text(_) => panic!("expected checklist"),
        }
    }

    #[test]
    fn item_text_keeps_markdown_body() {
        assert_eq!(
            item_text("- [ ] 🔬 **Lattes review:** read it"),
            "🔬 **Lattes review:** read it"
        );
    }
}
