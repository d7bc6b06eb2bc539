//! Context-budgeted prompt composition.
//!
//! Builds the longest prompt that fits the backend's context budget,
//! measured in characters. History windows grow from the oldest entry;
//! the first window that no longer fits ends the search and the last
//! accepted candidate wins. This is a greedy maximal-window policy, not
//! an optimal subset selection.

use crate::history::HistoryEntry;

/// Renders the prompt template under a character budget.
pub struct PromptComposer {
    template: String,
    budget: usize,
}

impl PromptComposer {
    /// Create a composer around a template with `{history}` and
    /// `{question}` slots.
    pub fn new(template: impl Into<String>, budget: usize) -> Self {
        Self {
            template: template.into(),
            budget,
        }
    }

    /// The configured character budget.
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Compose a prompt from as much history as fits.
    ///
    /// The zero-history rendering is the baseline candidate. Each larger
    /// oldest-first window replaces it only while the rendering stays
    /// strictly under the budget. If even the baseline is over budget,
    /// the trailing `budget` characters are kept so the most recent
    /// content survives.
    pub fn compose(&self, history: &[HistoryEntry], question: &str) -> String {
        let mut prompt = self.render(&[], question);

        for i in 0..history.len() {
            let candidate = self.render(&history[..=i], question);
            if char_len(&candidate) >= self.budget {
                break;
            }
            prompt = candidate;
        }

        if char_len(&prompt) > self.budget {
            prompt = tail_chars(&prompt, self.budget);
        }
        prompt
    }

    fn render(&self, window: &[HistoryEntry], question: &str) -> String {
        let history = window
            .iter()
            .map(|entry| format!("###Question: {}\n###Answer: {}", entry.question, entry.answer))
            .collect::<Vec<_>>()
            .join("\n");

        self.template
            .replace("{history}", &history)
            .replace("{question}", question)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Last `count` characters of the text.
fn tail_chars(text: &str, count: usize) -> String {
    let total = char_len(text);
    if total <= count {
        return text.to_string();
    }
    text.chars().skip(total - count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "{history}\n###Question: {question}\n###Answer: ";

    fn entry(question: &str, answer: &str) -> HistoryEntry {
        HistoryEntry {
            question: question.into(),
            answer: answer.into(),
        }
    }

    #[test]
    fn empty_history_renders_template_directly() {
        let composer = PromptComposer::new(TEMPLATE, 1000);
        let prompt = composer.compose(&[], "hello");
        assert_eq!(prompt, "\n###Question: hello\n###Answer: ");
    }

    #[test]
    fn history_is_included_when_it_fits() {
        let composer = PromptComposer::new(TEMPLATE, 1000);
        let history = vec![entry("first", "one"), entry("second", "two")];
        let prompt = composer.compose(&history, "third");

        assert!(prompt.contains("###Question: first\n###Answer: one"));
        assert!(prompt.contains("###Question: second\n###Answer: two"));
        assert!(prompt.ends_with("###Question: third\n###Answer: "));
    }

    #[test]
    fn never_exceeds_budget() {
        for budget in [10, 50, 100, 500] {
            let composer = PromptComposer::new(TEMPLATE, budget);
            let history: Vec<HistoryEntry> = (0..20)
                .map(|i| entry(&format!("question {i}"), &format!("answer {i}")))
                .collect();
            let prompt = composer.compose(&history, "does this fit?");
            assert!(
                prompt.chars().count() <= budget,
                "budget {budget} exceeded: {} chars",
                prompt.chars().count()
            );
        }
    }

    #[test]
    fn window_is_the_largest_that_fits() {
        let composer = PromptComposer::new("{history}|{question}", 70);
        let history = vec![
            entry("aa", "bb"), // window 1 renders to 31 chars -> fits
            entry("cc", "dd"), // window 2 renders to 61 chars -> fits
            entry("ee", "ff"), // window 3 renders to 91 chars -> over
        ];
        let prompt = composer.compose(&history, "q");

        assert!(prompt.contains("aa"));
        assert!(prompt.contains("cc"));
        assert!(!prompt.contains("ee"));
    }

    #[test]
    fn oversized_baseline_keeps_trailing_characters() {
        let composer = PromptComposer::new("{history}{question}", 10);
        let prompt = composer.compose(&[], "abcdefghijklmnop");
        assert_eq!(prompt, "ghijklmnop");
        assert_eq!(prompt.chars().count(), 10);
    }

    #[test]
    fn budget_is_measured_in_characters_not_bytes() {
        let composer = PromptComposer::new("{history}{question}", 4);
        // Four multibyte characters fit exactly even though they are
        // more than four bytes.
        let prompt = composer.compose(&[], "ÆØÅé");
        assert_eq!(prompt, "ÆØÅé");
    }

    #[test]
    fn candidate_reaching_budget_exactly_is_rejected() {
        // Baseline "|q" = 2 chars. Window 1 renders to exactly the
        // budget, so it must not be accepted.
        let composer = PromptComposer::new("{history}|{question}", 35);
        let history = vec![entry("aaaa", "bbbb")]; // renders to exactly 35 chars
        let prompt = composer.compose(&history, "q");
        assert_eq!(prompt, "|q");
    }
}
