//! Shared fixtures for auth tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use incridea_auth::{Session, User};

pub fn user() -> User {
    User::new("ada@incridea.in").with_id("42").with_name("Ada")
}

pub fn live_session() -> Session {
    Session::new(user(), Utc::now() + Duration::days(30))
}

pub fn expired_session() -> Session {
    Session::new(user(), Utc::now() - Duration::minutes(1))
}
