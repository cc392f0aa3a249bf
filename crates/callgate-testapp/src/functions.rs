//! Sample functions covering every accepted shape.

use callgate::prelude::*;
use serde::{Deserialize, Serialize};

pub async fn no_params_no_return(ctx: InvocationContext) -> Result<(), anyhow::Error> {
    tracing::info!(request_id = %ctx.request_id(), "NoParamsNoReturn called");
    Ok(())
}

pub async fn no_params_with_return(_ctx: InvocationContext) -> Result<String, anyhow::Error> {
    Ok("foo-value".to_string())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FooExample {
    pub foo: String,
    pub bar: i32,
}

/// Fields unknown to `FooExample` survive the round trip.
pub async fn param_with_return(
    _ctx: InvocationContext,
    mut foo: Partial<FooExample>,
) -> Result<Partial<FooExample>, anyhow::Error> {
    foo.foo.push_str("new-foo-value");
    foo.bar = 42;
    Ok(foo)
}

pub async fn accountability(ctx: InvocationContext) -> Result<Option<Accountability>, anyhow::Error> {
    tracing::info!(accountability = ?ctx.accountability(), "Accountability received");
    Ok(ctx.accountability().cloned())
}

#[derive(Debug, Deserialize)]
pub struct Title {
    pub title: String,
}

pub async fn validate_title(ctx: InvocationContext, input: Title) -> Result<String, CallError> {
    if input.title.trim().is_empty() {
        let collection = ctx.trigger().collection.clone();
        return Err(CallError::failed_validation(collection, "title", "title cannot be empty"));
    }
    Ok(input.title)
}

pub async fn local_error(_ctx: InvocationContext) -> Result<(), anyhow::Error> {
    anyhow::bail!("error message")
}

pub fn register_all(gateway: &mut Gateway) {
    gateway
        .register("noParamsNoReturn", no_params_no_return)
        .register("noParamsWithReturn", no_params_with_return)
        .register("paramWithReturn", param_with_return)
        .register("accountability", accountability)
        .register("validateTitle", validate_title)
        .register("localError", local_error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_param_with_return_keeps_extra_fields() {
        let input = Partial::from_value(json!({"foo": "a-", "bar": 1, "baz": true})).unwrap();
        let output = param_with_return(InvocationContext::mock("paramWithReturn"), input)
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(output).unwrap(),
            json!({"foo": "a-new-foo-value", "bar": 42, "baz": true})
        );
    }

    #[tokio::test]
    async fn test_validate_title() {
        let err = validate_title(
            InvocationContext::mock("validateTitle"),
            Title {
                title: "  ".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "FAILED_VALIDATION");
        assert_eq!(err.extensions()["field"], "title");
    }

    #[test]
    fn test_register_all() {
        let mut gateway = Gateway::new(GatewayConfig::default());
        register_all(&mut gateway);
        assert_eq!(gateway.registry().len(), 6);
    }
}
