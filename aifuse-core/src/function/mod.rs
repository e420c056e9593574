//! Convenience functions over a [`Provider`].
//!
//! Each function wraps one provider capability in the call-execution
//! pipeline: it emits `started` and `finished` events to the resolved
//! observers, honors the abort signal and post-processes the response.

mod embed;
mod image;
mod object;
mod options;
mod speech;
mod text;
mod transcription;

pub use embed::{cosine_similarity, embed, embed_many, EmbedManyResult};
pub use image::{generate_image, ImageResult};
pub use object::{generate_object, generate_object_with};
pub use options::FunctionOptions;
pub use speech::{generate_speech, stream_speech, SpeechStreamResult};
pub use text::{generate_text, generate_text_full, stream_text, TextStreamResult};
pub use transcription::{generate_transcription, transcribe};

use crate::provider::Provider;
use crate::types::ModelInformation;

pub(crate) fn model_information<P: Provider + ?Sized>(provider: &P, model: &str) -> ModelInformation {
    ModelInformation::new(provider.info().id.clone(), model)
}
