pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod transport;
pub mod wire;

// Public API
pub use config::{PersonaConfig, SessionConfig};
pub use error::SessionError;
pub use events::{GameType, GameUpdate, UiEvent};
pub use manager::{Session, SessionHandle, StartOptions};
pub use transport::{SessionTransport, WsTransport};
pub use wire::{ClientMessage, FunctionCall, ServerMessage};
