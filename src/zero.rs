// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::rules::clean_name;

use std::collections::BTreeMap;

use tracing::debug;

#[derive(Debug, Clone)]
struct ZeroEntry {
    ty: String,
    needed: bool,
}

/// Types substituted for placeholders that cannot be spelled `nil`.
///
/// A `return nil` in a function whose result is such a type is rewritten to
/// `zero_<Type>`, and one `var zero_<Type> <Type>` is emitted per needed
/// type.
#[derive(Debug, Clone, Default)]
pub struct ZeroValues {
    entries: BTreeMap<String, ZeroEntry>,
}

/// Whether `nil` is already a valid value of `ty`.
pub fn is_nillable(ty: &str) -> bool {
    ty.starts_with('*')
        || ty.starts_with("[]")
        || ty.starts_with("map[")
        || ty.starts_with("chan ")
        || ty.starts_with("<-chan")
        || ty.starts_with("func(")
        || ty.starts_with("interface")
        || matches!(ty, "error" | "any")
}

pub fn var_name(key: &str) -> String {
    format!("zero_{key}")
}

impl ZeroValues {
    pub fn register(&mut self, ty: &str) {
        if is_nillable(ty) {
            return;
        }
        self.entries.insert(
            clean_name(ty),
            ZeroEntry {
                ty: ty.to_string(),
                needed: false,
            },
        );
    }

    /// Records a `nil` returned as `ty`. Returns the variable to use instead.
    pub fn mark(&mut self, ty: &str) -> Option<String> {
        if is_nillable(ty) {
            return None;
        }
        let key = clean_name(ty);
        let entry = self.entries.get_mut(&key)?;
        if !entry.needed {
            debug!("zero value for `{}` needed", entry.ty);
            entry.needed = true;
        }
        Some(var_name(&key))
    }

    pub fn any_needed(&self) -> bool {
        self.entries.values().any(|e| e.needed)
    }

    /// The `(variable, type)` pairs to emit, clearing the needed flags.
    pub fn take_needed(&mut self) -> Vec<(String, String)> {
        self.entries
            .iter_mut()
            .filter(|(_, e)| e.needed)
            .map(|(key, e)| {
                e.needed = false;
                (var_name(key), e.ty.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nillable_types_are_skipped() {
        let mut zero = ZeroValues::default();
        for ty in ["*Node", "[]int", "map[string]int", "chan int", "func()", "interface{}", "error"] {
            zero.register(ty);
            assert_eq!(zero.mark(ty), None, "{ty}");
        }
        assert!(!zero.any_needed());
        zero.register("uint64");
        zero.register("cmap.CMap");
        assert_eq!(zero.mark("uint64"), Some("zero_uint64".to_string()));
        assert_eq!(zero.mark("cmap.CMap"), Some("zero_cmapCMap".to_string()));
    }

    #[test]
    fn needed_values() {
        let mut zero = ZeroValues::default();
        zero.register("uint64");
        zero.register("string");
        assert!(!zero.any_needed());
        assert_eq!(zero.mark("int"), None);
        assert_eq!(zero.mark("uint64"), Some("zero_uint64".to_string()));
        assert_eq!(zero.mark("uint64"), Some("zero_uint64".to_string()));
        assert!(zero.any_needed());
        assert_eq!(
            zero.take_needed(),
            vec![("zero_uint64".to_string(), "uint64".to_string())]
        );
        assert!(!zero.any_needed());
    }
}
