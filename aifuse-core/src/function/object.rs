//! Structured object generation.

use crate::error::AiError;
use crate::event::FunctionType;
use crate::function::{model_information, FunctionOptions};
use crate::provider::Provider;
use crate::runtime::{execute_standard_call, CallContext, Generated};
use crate::schema::{parse_json, Schema};
use crate::strategy::{detect_json_strategy, JsonOutputStrategy};
use crate::types::{ChatCompletionRequest, ObjectParams, ObjectResult};

fn object_request(model: &str, params: ObjectParams) -> ChatCompletionRequest {
    let mut request = ChatCompletionRequest::new(model, params.messages).with_stream(false);
    request.max_tokens = params.max_tokens;
    request.temperature = params.temperature;
    request
}

/// Parse and validate the model's answer
fn parse_object<T, S>(value_text: &str, schema: &S) -> Result<(T, serde_json::Value), AiError>
where
    S: Schema<T> + ?Sized,
{
    let value = parse_json(value_text).map_err(|e| AiError::ObjectParse {
        value_text: value_text.to_string(),
        message: e.to_string(),
    })?;

    let object = schema
        .validate(&value)
        .map_err(|e| AiError::ObjectValidation {
            value_text: value_text.to_string(),
            value: value.clone(),
            message: e.to_string(),
        })?;

    Ok((object, value))
}

/// Generate an object with an explicit JSON output strategy.
///
/// Text that is not JSON fails with [`AiError::ObjectParse`]; JSON that does
/// not match `schema` fails with [`AiError::ObjectValidation`].
pub async fn generate_object_with<T, S, P>(
    provider: &P,
    model: &str,
    params: ObjectParams,
    schema: &S,
    strategy: &dyn JsonOutputStrategy,
    options: FunctionOptions,
) -> Result<ObjectResult<T>, AiError>
where
    T: Send,
    S: Schema<T> + ?Sized,
    P: Provider + ?Sized,
{
    let input = serde_json::to_value(&params)?;
    let mut request = object_request(model, params);
    strategy.apply(&mut request, &schema.json_schema())?;

    let ctx = CallContext::new(
        FunctionType::GenerateObject,
        model_information(provider, model),
        input,
        options,
    );

    let output = execute_standard_call(ctx, || async move {
        let response = provider.chat_completion(request).await?;
        let choice = response
            .choices
            .first()
            .ok_or_else(|| AiError::provider("No choices in response"))?;
        let value_text = choice.message.text_content();
        let (object, value) = parse_object(&value_text, schema)?;

        let result = ObjectResult {
            object,
            value_text,
            usage: response.usage,
            model: response.model.clone(),
        };
        Ok(Generated::new(result, value)
            .with_raw_response(response.raw.clone())
            .with_usage(Some(response.usage)))
    })
    .await?;

    Ok(output.value)
}

/// Generate an object with the strategy detected for the provider
pub async fn generate_object<T, S, P>(
    provider: &P,
    model: &str,
    params: ObjectParams,
    schema: &S,
    options: FunctionOptions,
) -> Result<ObjectResult<T>, AiError>
where
    T: Send,
    S: Schema<T> + ?Sized,
    P: Provider + ?Sized,
{
    let strategy = detect_json_strategy(&provider.info().id);
    generate_object_with(provider, model, params, schema, strategy.as_ref(), options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema_of;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_parse_object_errors() {
        let schema = schema_of::<Point>();

        let (point, value) = parse_object::<Point, _>(r#"{"x":1,"y":2}"#, &schema).unwrap();
        assert_eq!(point, Point { x: 1, y: 2 });
        assert_eq!(value["y"], 2);

        match parse_object::<Point, _>("x=1", &schema) {
            Err(AiError::ObjectParse { value_text, .. }) => assert_eq!(value_text, "x=1"),
            other => panic!("expected parse error, got {other:?}"),
        }

        match parse_object::<Point, _>(r#"{"x":1}"#, &schema) {
            Err(AiError::ObjectValidation { value, message, .. }) => {
                assert_eq!(value, serde_json::json!({"x": 1}));
                assert!(message.contains('y'));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_object_request_carries_params() {
        let params = ObjectParams::new(vec![crate::types::Message::user("point")])
            .with_max_tokens(20)
            .with_temperature(0.0);
        let request = object_request("m", params);
        assert_eq!(request.max_tokens, Some(20));
        assert_eq!(request.stream, Some(false));
        assert!(request.response_format.is_none());
    }
}
