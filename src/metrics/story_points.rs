//! T-shirt size labels to numeric estimates.

use super::types::Issue;

/// Applied in order; a later match overwrites an earlier one, so with several
/// size labels the largest wins (XL > L > M > S > XS).
const SIZE_RULES: [(&str, u8); 10] = [
    ("XS", 1),
    ("xs", 1),
    ("S", 2),
    ("s", 2),
    ("M", 3),
    ("m", 3),
    ("L", 5),
    ("l", 5),
    ("XL", 8),
    ("xl", 8),
];

/// Estimate for a label set, `None` if no size label is present.
pub fn estimate(labels: &[String]) -> Option<u8> {
    SIZE_RULES.iter().fold(None, |points, (size, value)| {
        if labels.iter().any(|l| l == size) {
            Some(*value)
        } else {
            points
        }
    })
}

pub fn assign_story_points(issues: &mut [Issue]) {
    for issue in issues {
        issue.story_points = estimate(&issue.labels);
    }
}
