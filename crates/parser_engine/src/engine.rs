use parser_core::{TraceDocument, Wordform};

use crate::{EngineFault, TraceRequest};

/// The morphological parsing engine driven by the scheduler's worker.
///
/// Every call runs on the worker thread, one at a time. An `Err` (or a
/// panic) is treated as unrecoverable: the scheduler latches it and stops
/// taking work.
pub trait ParseEngine: Send {
    /// Reload grammar rules and lexicon from persistent storage. May return
    /// a notification for the user (for example grammar warnings).
    fn reload_grammar_and_lexicon(&mut self) -> Result<Option<String>, EngineFault>;

    /// Parse, and optionally trace, a single form. `Ok(None)` means the word
    /// could not be parsed.
    fn trace_word(&mut self, request: &TraceRequest) -> Result<Option<TraceDocument>, EngineFault>;

    /// Reparse one wordform and store its analyses.
    fn update_wordform(&mut self, wordform: &Wordform) -> Result<(), EngineFault>;
}
