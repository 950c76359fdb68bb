use reqwest::StatusCode;
use task_api::error::parse_error_message;
use task_api::TaskApiError;
use task_backend::{BackendError, FailureClass};

#[test]
fn parse_error_message_reads_string_detail() {
    let body = r#"{"detail":"Conversation not found or you don't have access"}"#;
    let message = parse_error_message(StatusCode::NOT_FOUND, body);
    assert_eq!(message, "Conversation not found or you don't have access");
}

#[test]
fn parse_error_message_joins_validation_details() {
    let body = r#"{"detail":[{"loc":["body","title"],"msg":"Title cannot be empty"},{"msg":"Description too long"}]}"#;
    let message = parse_error_message(StatusCode::UNPROCESSABLE_ENTITY, body);
    assert_eq!(message, "Title cannot be empty; Description too long");
}

#[test]
fn parse_error_message_reads_nested_error_message() {
    let body = r#"{"error":{"message":"invalid conversation"}}"#;
    let message = parse_error_message(StatusCode::BAD_REQUEST, body);
    assert_eq!(message, "invalid conversation");
}

#[test]
fn parse_error_message_falls_back_to_raw_body() {
    let body = "raw failure text";
    let message = parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, body);
    assert_eq!(message, "raw failure text");
}

#[test]
fn parse_error_message_uses_reason_for_empty_body() {
    let message = parse_error_message(StatusCode::SERVICE_UNAVAILABLE, "");
    assert_eq!(message, "Service Unavailable");
}

#[test]
fn status_errors_map_onto_backend_classes() {
    let unauthorized: BackendError = TaskApiError::Status {
        status: StatusCode::UNAUTHORIZED,
        message: "Token expired".to_string(),
    }
    .into();
    assert_eq!(unauthorized.class(), FailureClass::Authentication);

    let unavailable: BackendError = TaskApiError::Status {
        status: StatusCode::BAD_GATEWAY,
        message: "upstream".to_string(),
    }
    .into();
    assert_eq!(unavailable.class(), FailureClass::Retryable);

    let not_found: BackendError = TaskApiError::Status {
        status: StatusCode::NOT_FOUND,
        message: "Task 3 not found".to_string(),
    }
    .into();
    assert_eq!(not_found.class(), FailureClass::Terminal);
    assert_eq!(not_found.message(), "Task 3 not found");
}

#[test]
fn missing_credential_maps_to_authentication_failure() {
    let error: BackendError = TaskApiError::MissingCredential.into();
    assert_eq!(error.class(), FailureClass::Authentication);
}
