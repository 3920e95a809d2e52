use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc;

use parser_core::{TextId, Wordform, WordformId};

/// Change notification from the linguistic database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChange {
    /// The textual form of a wordform was edited.
    WordformFormEdited(Wordform),
    /// Lexicon or grammar entries changed.
    LexiconEdited,
    WordformDeleted(WordformId),
}

/// The slice of the linguistic database the session coordinator needs.
pub trait LinguisticModel {
    fn lexicon_is_empty(&self) -> bool;

    /// Distinct wordforms occurring in a text, in first-occurrence order.
    fn text_wordforms(&self, text: &TextId) -> Vec<Wordform>;

    fn all_wordforms(&self) -> Vec<Wordform>;

    fn subscribe_changes(&mut self) -> mpsc::Receiver<ModelChange>;
}

/// Simple in-process model for demos and tests.
#[derive(Debug, Default)]
pub struct InMemoryModel {
    lexemes: Vec<String>,
    wordforms: BTreeMap<WordformId, Wordform>,
    by_form: HashMap<String, WordformId>,
    texts: HashMap<TextId, Vec<WordformId>>,
    listeners: Vec<mpsc::Sender<ModelChange>>,
    next_id: u64,
}

impl InMemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lexeme(&mut self, lexeme: impl Into<String>) {
        self.lexemes.push(lexeme.into());
        self.notify(ModelChange::LexiconEdited);
    }

    /// Tokenizes `content` on whitespace, creating wordforms as needed.
    pub fn add_text(&mut self, name: impl Into<String>, content: &str) -> TextId {
        let id = TextId(name.into());
        let tokens = content
            .split_whitespace()
            .map(|token| self.intern(token))
            .collect();
        self.texts.insert(id.clone(), tokens);
        id
    }

    pub fn wordform(&self, form: &str) -> Option<Wordform> {
        self.by_form
            .get(form)
            .and_then(|id| self.wordforms.get(id))
            .cloned()
    }

    /// Changes the spelling of a wordform and notifies subscribers.
    pub fn edit_wordform(&mut self, id: WordformId, new_form: impl Into<String>) -> bool {
        let new_form = new_form.into();
        let Some(wordform) = self.wordforms.get_mut(&id) else {
            return false;
        };
        self.by_form.remove(&wordform.form);
        self.by_form.insert(new_form.clone(), id);
        wordform.form = new_form;
        let edited = wordform.clone();
        self.notify(ModelChange::WordformFormEdited(edited));
        true
    }

    pub fn delete_wordform(&mut self, id: WordformId) -> bool {
        let Some(wordform) = self.wordforms.remove(&id) else {
            return false;
        };
        self.by_form.remove(&wordform.form);
        for tokens in self.texts.values_mut() {
            tokens.retain(|token| *token != id);
        }
        self.notify(ModelChange::WordformDeleted(id));
        true
    }

    fn intern(&mut self, form: &str) -> WordformId {
        if let Some(id) = self.by_form.get(form) {
            return *id;
        }
        self.next_id += 1;
        let wordform = Wordform::new(self.next_id, form);
        let id = wordform.id;
        self.by_form.insert(form.to_string(), id);
        self.wordforms.insert(id, wordform);
        id
    }

    fn notify(&mut self, change: ModelChange) {
        self.listeners.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

impl LinguisticModel for InMemoryModel {
    fn lexicon_is_empty(&self) -> bool {
        self.lexemes.is_empty()
    }

    fn text_wordforms(&self, text: &TextId) -> Vec<Wordform> {
        let mut seen = Vec::new();
        for id in self.texts.get(text).into_iter().flatten() {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen.iter()
            .filter_map(|id| self.wordforms.get(id).cloned())
            .collect()
    }

    fn all_wordforms(&self) -> Vec<Wordform> {
        self.wordforms.values().cloned().collect()
    }

    fn subscribe_changes(&mut self) -> mpsc::Receiver<ModelChange> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use parser_core::TextId;

    use super::{InMemoryModel, LinguisticModel, ModelChange};

    #[test]
    fn text_wordforms_are_distinct_in_first_occurrence_order() {
        let mut model = InMemoryModel::new();
        let text = model.add_text("t1", "the cat saw the dog");
        let forms: Vec<_> = model
            .text_wordforms(&text)
            .into_iter()
            .map(|w| w.form)
            .collect();
        assert_eq!(forms, vec!["the", "cat", "saw", "dog"]);
        assert!(model.text_wordforms(&TextId("missing".into())).is_empty());
    }

    #[test]
    fn edits_are_broadcast() {
        let mut model = InMemoryModel::new();
        let changes = model.subscribe_changes();
        model.add_text("t1", "cat");
        let cat = model.wordform("cat").unwrap();

        assert!(model.edit_wordform(cat.id, "cats"));
        assert_eq!(model.wordform("cats").unwrap().id, cat.id);
        assert!(model.wordform("cat").is_none());
        model.add_lexeme("cat");

        let received: Vec<_> = changes.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert!(matches!(&received[0], ModelChange::WordformFormEdited(w) if w.form == "cats"));
        assert_eq!(received[1], ModelChange::LexiconEdited);
    }
}
