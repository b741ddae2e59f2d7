use std::time::Instant;

use super::{Next, Stage};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;

pub const PROFILE_HEADER: &str = "X-Profile-Milliseconds";

/// Reports how long everything below it took, in whole milliseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct Profile;

impl Stage for Profile {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            let started = Instant::now();
            let res = next.run(req).await?;
            Ok(res.with_header(PROFILE_HEADER, started.elapsed().as_millis()))
        })
    }
}
