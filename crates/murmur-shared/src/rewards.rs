//! Light-point reward policy.
//!
//! Points only ever increase; there is no spending mechanism.

use serde::{Deserialize, Serialize};

/// A participating action that earns light points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PointAction {
    PostCreated,
    ReplyCreated,
}

/// Point delta awarded for an action.
pub fn point_value(action: PointAction) -> i64 {
    match action {
        PointAction::PostCreated => 1,
        PointAction::ReplyCreated => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_post_and_one_reply_earn_six() {
        let total = point_value(PointAction::PostCreated) + point_value(PointAction::ReplyCreated);
        assert_eq!(total, 6);
    }
}
