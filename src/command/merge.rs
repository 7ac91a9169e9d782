use serde_json::Value;

/// 递归结构合并
///
/// 遍历 overlay 的键：base 中缺席则拷入；两侧都是映射则递归；
/// 其余情况 overlay 胜出。数组与标量视为不可再分的叶子。
/// 返回新值，两个输入都不被修改；合并本身永不失败。
///
/// 管线以默认载荷为 base、显式命令为 overlay，即命令覆盖默认值。
pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let value = match base_map.get(key) {
                    Some(base_value) => merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_disjoint_keys() {
        let base = json!({"a": 1});
        let overlay = json!({"b": 2});
        assert_eq!(merge(&base, &overlay), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let value = json!({"a": 1, "b": {"c": [1, 2], "d": "x"}});
        assert_eq!(merge(&value, &value), value);
    }

    #[test]
    fn test_overlay_wins_on_conflict() {
        let base = json!({"timeout": 30, "headers": {"Accept": "text/plain"}});
        let overlay = json!({"timeout": 2.5});
        let merged = merge(&base, &overlay);
        assert_eq!(merged["timeout"], json!(2.5));
        assert_eq!(merged["headers"], json!({"Accept": "text/plain"}));
    }

    #[test]
    fn test_nested_mappings_recurse() {
        let base = json!({"parameters": {"headers": {"Accept": "a", "X-Base": "1"}}});
        let overlay = json!({"parameters": {"headers": {"Accept": "b"}}});
        let merged = merge(&base, &overlay);
        assert_eq!(
            merged,
            json!({"parameters": {"headers": {"Accept": "b", "X-Base": "1"}}})
        );
    }

    #[test]
    fn test_incompatible_shapes_resolve_to_overlay() {
        // 类型冲突不报错，overlay 胜出
        let base = json!({"params": {"a": 1}});
        let overlay = json!({"params": "raw"});
        assert_eq!(merge(&base, &overlay), json!({"params": "raw"}));

        let base = json!({"params": "raw"});
        let overlay = json!({"params": {"a": 1}});
        assert_eq!(merge(&base, &overlay), json!({"params": {"a": 1}}));
    }

    #[test]
    fn test_lists_are_opaque_leaves() {
        let base = json!({"tags": [1, 2, 3]});
        let overlay = json!({"tags": [4]});
        assert_eq!(merge(&base, &overlay), json!({"tags": [4]}));
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let base = json!({"a": {"b": 1}});
        let overlay = json!({"a": {"c": 2}});
        let _ = merge(&base, &overlay);
        assert_eq!(base, json!({"a": {"b": 1}}));
        assert_eq!(overlay, json!({"a": {"c": 2}}));
    }
}
