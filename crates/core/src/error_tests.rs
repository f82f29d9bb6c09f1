//! Tests for the error taxonomy and its client serialization.

#[cfg(test)]
mod tests {
    use crate::{AppError, ErrorKind, GENERIC_INTERNAL_MESSAGE, generate_error_id};

    #[test]
    fn kinds_map_to_status_and_code() {
        let cases = [
            (AppError::validation("bad"), 400, "VALIDATION_ERROR"),
            (AppError::unauthorized("who"), 401, "AUTHENTICATION_ERROR"),
            (AppError::forbidden("no"), 403, "AUTHORIZATION_ERROR"),
            (AppError::not_found("Project"), 404, "NOT_FOUND"),
            (AppError::conflict("dup"), 409, "CONFLICT"),
            (AppError::rate_limited("slow down", Some(30)), 429, "RATE_LIMIT_EXCEEDED"),
            (AppError::internal("bug"), 500, "INTERNAL_ERROR"),
            (AppError::database("db", None), 500, "DATABASE_ERROR"),
            (AppError::ai_service("ai", Some(502)), 500, "AI_SERVICE_ERROR"),
            (AppError::network("down"), 503, "NETWORK_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status(), status, "{}", err.kind());
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn operational_defaults() {
        assert!(AppError::validation("x").is_operational());
        assert!(AppError::not_found("Milestone").is_operational());
        assert!(AppError::network("x").is_operational());
        assert!(!AppError::internal("x").is_operational());
        assert!(!AppError::database("x", None).is_operational());
        assert!(!AppError::conflict("x").non_operational().is_operational());
    }

    #[test]
    fn not_found_keeps_resource_in_payload() {
        let err = AppError::not_found("Assessment");
        assert_eq!(err.message(), "Assessment not found");
        assert_eq!(
            err.kind(),
            &ErrorKind::NotFound { resource: Some("Assessment".to_owned()) }
        );
    }

    #[test]
    fn error_ids_are_unique_and_well_formed() {
        let a = generate_error_id();
        let b = generate_error_id();
        assert_ne!(a, b);
        let parts: Vec<&str> = a.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "err");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn context_if_absent_does_not_overwrite() {
        let err = AppError::validation("bad")
            .with_context("submission:title")
            .with_context_if_absent("transaction");
        assert_eq!(err.context(), Some("submission:title"));
        let err = AppError::validation("bad").with_context_if_absent("transaction");
        assert_eq!(err.context(), Some("transaction"));
    }

    #[test]
    fn production_body_hides_internals() {
        let source = std::io::Error::other("disk on fire");
        let err = AppError::internal("null deref in grading")
            .with_source(source)
            .with_details(serde_json::json!({"row": 7}));
        let body = err.to_body(false);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.message, GENERIC_INTERNAL_MESSAGE);
        assert!(body.details.is_none());
        assert_eq!(body.error_id, err.error_id());

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("details").is_none());
        assert!(json.get("context").is_none());
        assert!(json["errorId"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn production_body_keeps_operational_message() {
        let err = AppError::validation("title is required").with_context("project:title");
        let body = err.to_body(false);
        assert_eq!(body.message, "title is required");
        assert_eq!(body.context.as_deref(), Some("project:title"));
    }

    #[test]
    fn development_body_exposes_details() {
        let err = AppError::internal("boom")
            .with_source(std::io::Error::other("root cause"))
            .with_details(serde_json::json!({"failedStep": 2}));
        let body = err.to_body(true);
        assert_eq!(body.message, "boom");
        let details = body.details.unwrap();
        assert_eq!(details["kind"], "internal");
        assert_eq!(details["operational"], false);
        assert_eq!(details["causes"][0], "root cause");
        assert_eq!(details["data"]["failedStep"], 2);
    }

    #[test]
    fn anyhow_conversion_recovers_app_error() {
        let original = AppError::conflict("already enrolled");
        let id = original.error_id().to_owned();
        let wrapped = anyhow::Error::new(original);
        let back = AppError::from(wrapped);
        assert_eq!(back.code(), "CONFLICT");
        assert_eq!(back.error_id(), id);
    }

    #[test]
    fn anyhow_conversion_of_foreign_error_is_internal() {
        let err = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.kind(), &ErrorKind::Internal);
        assert_eq!(err.message(), "boom");
        assert!(!err.is_operational());
        assert_eq!(err.source_chain(), vec!["boom".to_owned()]);
    }

    #[test]
    fn display_is_the_message() {
        let err = AppError::forbidden("instructors only");
        assert_eq!(err.to_string(), "instructors only");
    }
}
