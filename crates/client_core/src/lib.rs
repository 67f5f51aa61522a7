pub mod asset;
pub mod config;
pub mod error;
pub mod prediction;
pub mod preview;
pub mod session;

pub use asset::{AssetId, ImageAsset, ImageFile, ValidatedImage};
pub use config::{load_settings, ClientSettings};
pub use error::{AssetError, CommandRejected, PredictionError, SettingsError};
pub use prediction::{ImageUpload, PredictionClient, RoastPredictor};
pub use preview::{InMemoryPreviewStore, PreviewData, PreviewHandle, PreviewStore};
pub use session::{
    OutcomeDisposition, PredictionOutcome, SessionController, SessionPhase, SessionState,
    SessionView, SubmitTicket,
};
