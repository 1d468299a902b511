//! Shared fixtures for query tests.

#![allow(dead_code)]

use incridea_cache::Selection;
use incridea_query::{FetchPolicy, QueryDescriptor};
use serde_json::{json, Value};

pub const USERS_DOCUMENT: &str = "query GetAllUsers { users { __typename id name } }";

pub fn users_selection() -> Selection {
    Selection::new().object(
        "users",
        Selection::new().scalar("__typename").scalar("id").scalar("name"),
    )
}

pub fn users_query(policy: FetchPolicy) -> QueryDescriptor {
    QueryDescriptor::new("GetAllUsers", USERS_DOCUMENT, users_selection()).with_policy(policy)
}

pub fn users_data() -> Value {
    json!({
        "users": [
            {"__typename": "User", "id": "1", "name": "Ada"},
            {"__typename": "User", "id": "2", "name": "Grace"}
        ]
    })
}

pub fn renamed_users_data() -> Value {
    json!({
        "users": [
            {"__typename": "User", "id": "1", "name": "Ada Lovelace"},
            {"__typename": "User", "id": "2", "name": "Grace Hopper"}
        ]
    })
}
