mod chunked;
mod presigned;
mod standard;

use chrono::{TimeZone, Utc};
use http::request::Parts;
use http::Request;
use sigv4a::Credential;
use sigv4a_core::time::{DateTime, FixedClock};
use sigv4a_core::Context;

pub const ACCESS_KEY_ID: &str = "AKIDEXAMPLE";
pub const SECRET_ACCESS_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

/// 2015-08-30T12:36:00Z
pub fn signing_time() -> DateTime {
    Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
}

/// Context whose clock is frozen at `time`.
pub fn context_at(time: DateTime) -> Context {
    let _ = env_logger::builder().is_test(true).try_init();
    Context::new().with_clock(FixedClock(time))
}

pub fn context() -> Context {
    context_at(signing_time())
}

pub fn credential() -> Credential {
    Credential::new(ACCESS_KEY_ID, SECRET_ACCESS_KEY)
}

pub fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> Parts {
    let mut req = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        req = req.header(*k, *v);
    }
    req.body(()).expect("request must be valid").into_parts().0
}
