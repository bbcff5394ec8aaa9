//! Concrete providers for the pipeline ports: Gemini and SerpAPI behind the
//! script backend, HTTP diffusion and TTS services, and an ffmpeg assembler.

pub mod assembly;
pub mod factory;
mod http_error;
pub mod image;
pub mod script;
pub mod speech;

pub use factory::build_stages;
pub use http_error::{ProviderHttpError, ProviderHttpErrorKind};
