//! # OpenSubsonic Provider
//!
//! Connects the offline core to an OpenSubsonic-compatible server:
//! - Salted-token authentication (`t = md5(password + s)`)
//! - `download` / `stream` URL construction for the media source
//! - `getStarred2` for the user's favorite tracks
//!
//! Implements [`MediaSource`](bridge_traits::MediaSource) and
//! [`StarredTracksSource`](bridge_traits::StarredTracksSource).

pub mod config;
pub mod connector;
pub mod error;
pub mod types;

pub use config::SubsonicConfig;
pub use connector::SubsonicConnector;
pub use error::{Result, SubsonicError};
