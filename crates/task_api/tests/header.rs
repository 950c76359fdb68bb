use task_api::headers::{
    build_headers, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_TIMEZONE,
    HEADER_USER_AGENT,
};
use task_api::{TaskApiConfig, TaskApiError};

#[test]
fn header_map_contains_bearer_and_timezone() {
    let config = TaskApiConfig::new("http://localhost:8000").insert_header("X-Extra", " value ");

    let headers =
        build_headers(&config, " token-1 ", Some("Europe/Berlin")).expect("header construction");
    assert_eq!(
        headers.get(HEADER_AUTHORIZATION).expect("authorization header"),
        &"Bearer token-1".to_owned()
    );
    assert_eq!(
        headers.get(HEADER_TIMEZONE).expect("timezone header"),
        &"Europe/Berlin".to_owned()
    );
    assert_eq!(
        headers.get(HEADER_ACCEPT).expect("accept"),
        &"application/json".to_owned()
    );
    assert_eq!(
        headers.get(HEADER_CONTENT_TYPE).expect("content-type"),
        &"application/json".to_owned()
    );
    assert_eq!(headers.get("x-extra").expect("custom"), &"value".to_owned());
}

#[test]
fn header_map_omits_blank_timezone() {
    let config = TaskApiConfig::default();
    let headers = build_headers(&config, "token", Some("  ")).expect("header construction");
    assert!(!headers.contains_key(HEADER_TIMEZONE));
}

#[test]
fn header_map_rejects_blank_credential() {
    let config = TaskApiConfig::default();
    let error = build_headers(&config, "   ", None).expect_err("blank credential must fail");
    assert!(matches!(error, TaskApiError::MissingCredential));
}

#[test]
fn header_map_prefers_configured_user_agent() {
    let config = TaskApiConfig::default().with_user_agent("test-agent");
    let headers = build_headers(&config, "token", None).expect("header construction");
    assert_eq!(
        headers.get(HEADER_USER_AGENT).expect("user-agent"),
        &"test-agent".to_string()
    );
}

#[test]
fn header_map_default_user_agent_names_the_client() {
    let headers =
        build_headers(&TaskApiConfig::default(), "token", None).expect("header construction");
    assert!(headers
        .get(HEADER_USER_AGENT)
        .expect("user-agent")
        .starts_with("taskpilot/"));
}
