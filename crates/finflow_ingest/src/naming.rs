//! Raw table naming from inbox directory structure.

use std::path::{Component, Path};

/// Map `<base>/<Bank>/<StatementType>` to a snake_case table name.
///
/// `T-Bank/transactions` → `t_bank_transactions`. Every character outside
/// `[a-z0-9_]` (after lowercasing) becomes `_`, runs of `_` collapse, and
/// leading/trailing `_` are trimmed. An empty result yields `unknown`.
pub fn derive_table_name(dir_path: &Path, base_path: &Path) -> String {
    let rel = dir_path.strip_prefix(base_path).unwrap_or(dir_path);
    let raw_name = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();

    let mut name = String::with_capacity(raw_name.len());
    for ch in raw_name.chars() {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '_'
        };
        if ch == '_' && name.ends_with('_') {
            continue;
        }
        name.push(ch);
    }

    let name = name.trim_matches('_');
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_derive_table_name() {
        let base = PathBuf::from("/base/path");
        let cases = [
            (base.join("T-Bank").join("transactions"), "t_bank_transactions"),
            (base.join("My-Bank").join("cards"), "my_bank_cards"),
            (base.join("Bank-Name").join("loans"), "bank_name_loans"),
            (base.join("Test@Bank").join("data"), "test_bank_data"),
        ];

        for (dir, expected) in cases {
            assert_eq!(derive_table_name(&dir, &base), expected);
        }
    }

    #[test]
    fn test_derive_table_name_collapses_and_trims() {
        let base = PathBuf::from("/in");
        assert_eq!(
            derive_table_name(&base.join("__Big  Bank__").join("--Cards--"), &base),
            "big_bank_cards"
        );
        assert_eq!(
            derive_table_name(&base.join("Сбер").join("2024 Q1"), &base),
            "2024_q1"
        );
    }

    #[test]
    fn test_derive_table_name_empty_is_unknown() {
        let base = PathBuf::from("/in");
        assert_eq!(derive_table_name(&base.join("@@@").join("!!!"), &base), "unknown");
        assert_eq!(derive_table_name(&base, &base), "unknown");
    }
}
