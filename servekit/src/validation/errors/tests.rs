//! Tests for flattening validator reports into field errors.

use super::*;
use crate::validation::rules::one_of;
use actix_web::body::to_bytes;
use rstest::{fixture, rstest};
use validator::Validate;

#[derive(Debug, Validate)]
struct Address {
    #[validate(length(min = 2))]
    city: String,
}

#[derive(Debug, Validate)]
struct Item {
    #[validate(required)]
    name: Option<String>,
}

fn sort_rule(value: &str) -> Result<(), ValidationError> {
    one_of(value, &["asc", "desc"])
}

#[derive(Debug, Validate)]
struct Order {
    #[validate(nested)]
    address: Address,
    #[validate(custom(function = "sort_rule"))]
    sort: String,
    #[validate(nested)]
    items: Vec<Item>,
    #[validate(required)]
    name: Option<String>,
    #[validate(range(min = 1, max = 10))]
    quantity: u32,
    #[validate(url)]
    homepage: Option<String>,
}

#[fixture]
fn invalid_order() -> Order {
    Order {
        address: Address {
            city: "X".to_owned(),
        },
        sort: "sideways".to_owned(),
        items: vec![
            Item {
                name: Some("tea".to_owned()),
            },
            Item { name: None },
        ],
        name: None,
        quantity: 20,
        homepage: Some("not a url".to_owned()),
    }
}

fn report_for(order: &Order) -> ValidationErrors {
    order.validate().expect_err("order must be invalid")
}

#[rstest]
fn flattens_nested_paths_in_field_order(invalid_order: Order) {
    let errors = FieldErrors::from_report(&report_for(&invalid_order));

    let summary: Vec<_> = errors
        .iter()
        .map(|error| (error.field.as_str(), error.tag.as_str(), error.message.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("address.city", "min", "address.city must be at least 2"),
            ("homepage", "url", "homepage must be a valid URL"),
            ("items[1].name", "required", "items[1].name is required"),
            ("name", "required", "name is required"),
            ("quantity", "max", "quantity must be at most 10"),
            ("sort", "oneof", "sort must be one of: asc, desc"),
        ]
    );
}

#[rstest]
fn keeps_offending_values(invalid_order: Order) {
    let errors = FieldErrors::from_report(&report_for(&invalid_order));

    let value_of = |field: &str| {
        errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.value.clone())
            .expect("field error present")
    };
    assert_eq!(value_of("quantity"), "20");
    assert_eq!(value_of("sort"), "sideways");
    assert_eq!(value_of("name"), "");
}

#[rstest]
fn range_below_minimum_reports_min(mut invalid_order: Order) {
    invalid_order.quantity = 0;
    let errors = FieldErrors::from_report(&report_for(&invalid_order));

    let quantity = errors
        .iter()
        .find(|error| error.field == "quantity")
        .expect("quantity error");
    assert_eq!(quantity.tag, "min");
    assert_eq!(quantity.message, "quantity must be at least 1");
}

#[rstest]
fn formatting_is_idempotent(invalid_order: Order) {
    let report = report_for(&invalid_order);

    assert_eq!(
        FieldErrors::from_report(&report),
        FieldErrors::from_report(&report)
    );
}

#[rstest]
fn every_violation_has_a_message(invalid_order: Order) {
    let errors = FieldErrors::from_report(&report_for(&invalid_order));

    assert_eq!(errors.len(), 6);
    assert!(errors.iter().all(|error| !error.message.is_empty()));
}

#[rstest]
#[case("required", "", "email is required")]
#[case("min", "3", "email must be at least 3")]
#[case("max", "64", "email must be at most 64")]
#[case("url", "", "email must be a valid URL")]
#[case("oneof", "a b c", "email must be one of: a, b, c")]
#[case("email", "", "email is invalid")]
#[case("custom_rule", "x", "email is invalid")]
fn messages_follow_the_tag(#[case] tag: &str, #[case] param: &str, #[case] expected: &str) {
    assert_eq!(message_for(tag, "email", param), expected);
}

#[rstest]
fn display_joins_field_messages() {
    let errors = FieldErrors::from(vec![
        FieldError {
            field: "name".to_owned(),
            tag: "required".to_owned(),
            value: String::new(),
            message: "name is required".to_owned(),
        },
        FieldError {
            field: "age".to_owned(),
            tag: "min".to_owned(),
            value: "3".to_owned(),
            message: "age must be at least 18".to_owned(),
        },
    ]);

    assert_eq!(
        errors.to_string(),
        "validation failed: name: name is required; age: age must be at least 18"
    );
}

#[actix_web::test]
async fn renders_bad_request_with_details() {
    let errors = FieldErrors::from(vec![FieldError {
        field: "name".to_owned(),
        tag: "required".to_owned(),
        value: String::new(),
        message: "name is required".to_owned(),
    }]);

    let response = errors.error_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body()).await.expect("body");
    let json: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(
        json,
        serde_json::json!({
            "message": "validation failed: name: name is required",
            "statusCode": 400,
            "details": [{
                "field": "name",
                "tag": "required",
                "message": "name is required",
            }],
        })
    );
}
