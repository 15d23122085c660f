use serde_json::Value;

use super::{cell, payload};

/// Headline figure per command, most specific first. Dotted paths reach
/// into nested objects.
const PRIORITY_PATHS: [&str; 8] = [
    "net_pay",
    "is_compliant",
    "run.totals.net_amount",
    "totals.net_amount",
    "baseline_totals.net_amount",
    "net_amount",
    "total_payments",
    "amount_restored",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(payload(value)));
}

fn headline(result: &Value) -> String {
    for path in PRIORITY_PATHS {
        if let Some(val) = lookup(result, path).filter(|v| !v.is_null()) {
            return cell(val);
        }
    }
    match result {
        Value::Object(map) => map
            .iter()
            .next()
            .map(|(key, val)| format!("{}: {}", key, cell(val)))
            .unwrap_or_default(),
        other => cell(other),
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |node, key| node.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_totals_path() {
        let receipt = json!({"run": {"id": "run-0001", "totals": {"net_amount": "2900.00"}}});
        assert_eq!(headline(&receipt), "2900.00");
    }

    #[test]
    fn test_priority_order() {
        let entry = json!({"employee_id": "e1", "net_pay": "2700.00"});
        assert_eq!(headline(&entry), "2700.00");
    }

    #[test]
    fn test_fallback_first_field() {
        let v = json!({"alpha": 1});
        assert_eq!(headline(&v), "alpha: 1");
    }
}
