// Test assertions for HTTP responses

use crate::TestResponse;
use trestle_core::HttpStatus;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {} (body: {})",
        expected,
        actual,
        response.body_string()
    );
}

pub fn assert_http_status(response: &TestResponse, expected: HttpStatus) {
    assert_status(response, expected.code());
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

pub fn assert_no_header(response: &TestResponse, key: &str) {
    let actual = response.header(key);
    assert!(
        actual.is_none(),
        "Expected no header '{}', got {:?}",
        key,
        actual
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response body deserializes to `expected`
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let actual: T = response
        .body_json()
        .unwrap_or_else(|e| panic!("Failed to deserialize response body: {}", e));
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert a 3xx with the given `Location`
pub fn assert_redirect(response: &TestResponse, expected_location: &str) {
    let status = response.status();
    assert!(
        (300..400).contains(&status),
        "Expected redirect status (3xx), got {}",
        status
    );
    assert_header(response, "Location", expected_location);
}

/// Assert that the response sets `name` to a live value
pub fn assert_sets_cookie(response: &TestResponse, name: &str) {
    match response.cookie(name) {
        Some(cookie) => assert!(
            !cookie.is_removal(),
            "Expected cookie '{}' to be set, but it was cleared",
            name
        ),
        None => panic!("Expected Set-Cookie for '{}'", name),
    }
}

/// Assert that the response tells the client to drop `name`
pub fn assert_clears_cookie(response: &TestResponse, name: &str) {
    match response.cookie(name) {
        Some(cookie) => assert!(
            cookie.is_removal(),
            "Expected cookie '{}' to be cleared, got {:?}",
            name,
            cookie
        ),
        None => panic!("Expected Set-Cookie clearing '{}'", name),
    }
}

/// Assert that a response is a client error (4xx status)
pub fn assert_client_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

/// Assert that a response has JSON content type
pub fn assert_json_content_type(response: &TestResponse) {
    let content_type = response.header("Content-Type");
    assert!(
        content_type.is_some_and(|ct| ct.contains("application/json")),
        "Expected JSON content type, got {:?}",
        content_type
    );
}
