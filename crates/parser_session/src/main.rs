use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use parser_core::SessionEvent;
use parser_engine::{ParseEngine, ScriptedEngine};
use parser_logging::{parser_info, LevelFilter, LogDestination};
use parser_session::{InMemoryModel, ParserSession, SessionSettings};

fn sample_engine() -> Box<dyn ParseEngine> {
    Box::new(
        ScriptedEngine::new()
            .with_entry("the", &["the.DET"])
            .with_entry("cat", &["cat.N"])
            .with_entry("saw", &["see.V-PST", "saw.N"])
            .with_entry("dogs", &["dog.N-PL", "dog.V-3SG"])
            .with_reload_notification("Grammar loaded with 0 warnings"),
    )
}

fn main() -> anyhow::Result<()> {
    parser_logging::initialize(LogDestination::Terminal, LevelFilter::Info);

    let settings = match std::env::args().nth(1) {
        Some(path) => SessionSettings::load(Path::new(&path)),
        None => SessionSettings::default(),
    };
    let deadline = settings.trace_wait_timeout();

    let mut model = InMemoryModel::new();
    for lexeme in ["the", "cat", "see", "saw", "dog"] {
        model.add_lexeme(lexeme);
    }
    let text = model.add_text("sample", "the cat saw the dogs");

    let mut session = ParserSession::new(model, Box::new(sample_engine), settings);
    if !session.connect_to_parser() {
        bail!("could not start the parser");
    }

    match session.trace_and_wait("saw", true)? {
        Some(document) => println!(
            "{}",
            serde_json::to_string_pretty(&document).context("render trace")?
        ),
        None => println!("'saw' could not be parsed"),
    }

    session.reparse_text_and_verify(&text)?;
    let started = Instant::now();
    loop {
        session.pump();
        while let Some(event) = session.try_recv_event() {
            match event {
                SessionEvent::StatusChanged(status) => println!("status: {status}"),
                SessionEvent::Notification(message) => println!("note: {message}"),
                SessionEvent::FatalError(message) => bail!("parser failed: {message}"),
                SessionEvent::ShowConflicts(text) => {
                    parser_info!("Verification of {} complete", text);
                    session.disconnect_from_parser();
                    return Ok(());
                }
            }
        }
        if started.elapsed() > deadline {
            bail!("timed out waiting for {text} to be reparsed");
        }
        thread::sleep(Duration::from_millis(20));
    }
}
