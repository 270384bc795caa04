//! Sutu ABR - Photoshop brush (ABR) decoding and encoding
//!
//! This is the library crate behind Sutu's brush import and export.

pub mod abr;
pub mod io;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use abr::{AbrDecoder, AbrEncoder, AbrError, BrushDocument, BrushImage, SaveOptions};

/// Initialize logging. Safe to call more than once.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sutu_abr=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Sutu ABR logging initialized");
    }
}
