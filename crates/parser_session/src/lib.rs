//! Parser session: UI-facing coordinator around a background parser connection.
mod coordinator;
mod error;
mod model;
mod settings;
mod timer;

pub use coordinator::{EngineFactory, ParserSession};
pub use error::{SessionError, SettingsError};
pub use model::{InMemoryModel, LinguisticModel, ModelChange};
pub use settings::SessionSettings;
pub use timer::RefreshTimer;
