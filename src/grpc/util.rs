use thiserror::Error;
use tonic::metadata::{Ascii, KeyAndValueRef, MetadataKey, MetadataMap, MetadataValue};
use tracing::debug;

use crate::context::Context;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("context carries no incoming grpc metadata")]
    NoMetadata,
    #[error("header {0} not in metadata")]
    FieldNotFound(String),
}

/// First value of `field` in the context's incoming metadata. Bytes outside
/// visible ASCII are decoded as UTF-8, lossily.
pub fn extract_header(ctx: &Context, field: &str) -> Result<String, MetadataError> {
    let metadata = ctx.incoming_metadata().ok_or(MetadataError::NoMetadata)?;
    let value = metadata
        .get(field)
        .ok_or_else(|| MetadataError::FieldNotFound(field.to_string()))?;
    Ok(match value.to_str() {
        Ok(text) => text.to_owned(),
        Err(_) => String::from_utf8_lossy(value.as_encoded_bytes()).into_owned(),
    })
}

pub fn log_metadata(metadata: &MetadataMap) {
    metadata_for_each(metadata, |key, value| {
        debug!(key = %key.as_str(), value = ?value, "metadata")
    });
}

fn metadata_for_each<F>(metadata: &MetadataMap, mut f: F)
where
    F: FnMut(&MetadataKey<Ascii>, &MetadataValue<Ascii>),
{
    for key_and_value in metadata.iter() {
        match key_and_value {
            KeyAndValueRef::Ascii(key, value) => f(key, value),
            KeyAndValueRef::Binary(key, _value) => {
                debug!(key = %key.as_str(), "binary metadata skipped")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(pairs: &[(&'static str, &str)]) -> Context {
        let mut metadata = MetadataMap::new();
        for (key, value) in pairs {
            metadata.append(*key, value.parse().unwrap());
        }
        Context::incoming(metadata)
    }

    #[test]
    fn returns_first_value() {
        let ctx = ctx_with(&[("ophid", "first"), ("ophid", "second")]);
        assert_eq!(extract_header(&ctx, "ophid"), Ok("first".to_string()));
    }

    #[test]
    fn missing_field() {
        let ctx = ctx_with(&[("other", "x")]);
        assert_eq!(
            extract_header(&ctx, "ophid"),
            Err(MetadataError::FieldNotFound("ophid".to_string()))
        );
    }

    #[test]
    fn no_metadata() {
        assert_eq!(
            extract_header(&Context::background(), "ophid"),
            Err(MetadataError::NoMetadata)
        );
    }

    #[test]
    fn utf8_value_is_kept() {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "request-id",
            MetadataValue::try_from(&b"r\xc3\xa9q-1"[..]).unwrap(),
        );
        let ctx = Context::incoming(metadata);
        assert_eq!(extract_header(&ctx, "request-id"), Ok("réq-1".to_string()));
    }

    #[test]
    fn non_utf8_value_is_decoded_lossily() {
        let mut metadata = MetadataMap::new();
        metadata.insert("ophid", MetadataValue::try_from(&[b'a', 0xfa, 0xfb][..]).unwrap());
        let ctx = Context::incoming(metadata);
        assert_eq!(
            extract_header(&ctx, "ophid"),
            Ok("a\u{fffd}\u{fffd}".to_string())
        );
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = MetadataError::FieldNotFound("request-id".into());
        assert_eq!(err.to_string(), "header request-id not in metadata");
    }
}
