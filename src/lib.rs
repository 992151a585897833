//! Self-hosted video intake and gallery server.
//!
//! Uploads are deduplicated by SHA-256 against a PostgreSQL uniqueness index,
//! the gallery lists a shuffled, bounded sample of the media root with cached
//! thumbnails, and every route but `/` sits behind a short-lived session.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod media;
    pub mod session;
    pub mod upload;
}

pub mod repositories {
    pub mod uniqueness;
}

pub mod services {
    pub mod catalog;
    pub mod sessions;
    pub mod thumbnails;
    pub mod uploads;
}

pub mod handlers {
    pub mod gallery;
    pub mod upload;
}

pub mod middleware_layer {
    pub mod listing;
    pub mod referer;
    pub mod session;
}
