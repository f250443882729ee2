pub mod error;
pub mod observation;
pub mod schema;
pub mod settings;
pub mod table;

pub use error::SchemaError;
pub use observation::{LabelledObservation, Observation, Outcome, OutcomeChoice};
pub use schema::pima;
pub use settings::{ForestParams, Settings, SettingsError};
