//! Compression of prior phase outputs fed forward as context.

use crate::core::string::truncate;

/// Total budget for carried-forward outputs.
pub const CONTEXT_BUDGET: usize = 6_000;
/// Size older outputs are compressed to.
pub const COMPRESSED_OUTPUT_SIZE: usize = 400;

/// Render `(label, output)` pairs within `budget` bytes.
///
/// The latest output is kept in full while it fits. Older outputs are cut
/// to `compressed` bytes once the total exceeds the budget, and dropped
/// oldest-first if that is still not enough.
pub fn compress_outputs(outputs: &[(String, String)], budget: usize, compressed: usize) -> String {
    let render = |items: &[(String, String)]| {
        items
            .iter()
            .map(|(label, text)| format!("### {}\n{}", label, text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let full = render(outputs);
    if full.len() <= budget || outputs.is_empty() {
        return full;
    }

    let last = outputs.len() - 1;
    let mut items: Vec<(String, String)> = outputs
        .iter()
        .enumerate()
        .map(|(i, (label, text))| {
            if i == last {
                (label.clone(), text.clone())
            } else {
                (label.clone(), truncate(text, compressed))
            }
        })
        .collect();

    while render(&items).len() > budget && items.len() > 1 {
        items.remove(0);
    }
    let rendered = render(&items);
    if rendered.len() > budget {
        return truncate(&rendered, budget);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(label: &str, len: usize) -> (String, String) {
        (label.to_string(), "x".repeat(len))
    }

    #[test]
    fn test_under_budget_is_untouched() {
        let outputs = vec![out("a", 10), out("b", 10)];
        let text = compress_outputs(&outputs, 1_000, 5);
        assert!(text.contains(&"x".repeat(10)));
    }

    #[test]
    fn test_latest_kept_in_full_when_over_budget() {
        let outputs = vec![out("a", 3_000), out("b", 3_000), out("c", 2_000)];
        let text = compress_outputs(&outputs, CONTEXT_BUDGET, COMPRESSED_OUTPUT_SIZE);
        assert!(text.len() <= CONTEXT_BUDGET);
        assert!(text.ends_with(&"x".repeat(2_000)));
        assert!(text.contains("### a"));
    }

    #[test]
    fn test_oldest_dropped_when_compression_is_not_enough() {
        let outputs: Vec<_> = (0..40).map(|i| out(&format!("p{}", i), 1_000)).collect();
        let text = compress_outputs(&outputs, 3_000, 400);
        assert!(text.len() <= 3_000);
        assert!(!text.contains("### p0\n"));
        assert!(text.contains("### p39"));
    }
}
