//! Image generation.

use crate::error::AiError;
use crate::event::FunctionType;
use crate::function::{model_information, FunctionOptions};
use crate::provider::Provider;
use crate::runtime::{execute_standard_call, CallContext, Generated};
use crate::types::ImageRequest;
use base64::Engine;

/// Decoded images of one generation
#[derive(Debug, Clone)]
pub struct ImageResult {
    /// First image
    pub image: Vec<u8>,
    pub images: Vec<Vec<u8>>,
    /// Images as returned by the provider
    pub base64_images: Vec<String>,
    pub raw_response: Option<serde_json::Value>,
}

fn decode_images(base64_images: &[String]) -> Result<Vec<Vec<u8>>, AiError> {
    base64_images
        .iter()
        .enumerate()
        .map(|(index, encoded)| {
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| AiError::provider(format!("Image {} is not valid base64: {}", index, e)))
        })
        .collect()
}

/// Generate images and decode them from base64
pub async fn generate_image<P: Provider + ?Sized>(
    provider: &P,
    request: ImageRequest,
    options: FunctionOptions,
) -> Result<ImageResult, AiError> {
    let ctx = CallContext::new(
        FunctionType::GenerateImage,
        model_information(provider, &request.model),
        serde_json::to_value(&request)?,
        options,
    );

    let output = execute_standard_call(ctx, || async move {
        let response = provider.generate_image(request).await?;
        let images = decode_images(&response.images)?;
        let image = images
            .first()
            .cloned()
            .ok_or_else(|| AiError::provider("No images in response"))?;

        let event_value = serde_json::json!({ "images": images.len() });
        let raw = response.raw.clone();
        let result = ImageResult {
            image,
            images,
            base64_images: response.images,
            raw_response: response.raw,
        };
        Ok(Generated::new(result, event_value).with_raw_response(raw))
    })
    .await?;

    Ok(output.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_images() {
        let images = vec!["aGVsbG8=".to_string(), " d29ybGQ=\n".to_string()];
        let decoded = decode_images(&images).unwrap();
        assert_eq!(decoded, vec![b"hello".to_vec(), b"world".to_vec()]);

        let err = decode_images(&["not base64!".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Image 0"));
    }
}
