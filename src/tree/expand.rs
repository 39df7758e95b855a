//! Data-driven expansion: one declaration plus a data set becomes one sibling
//! node per item, in input order.
//!
//! Each node gets a [`DataBinding`] holding every key of its item (when the item
//! is a map) plus the whole item under [`ITEM_KEY`]. Names may reference bound
//! values as `<key>`; `<_>` renders the whole item.

use im::OrdMap;

use crate::value::Value;

/// Reserved binding name for the current item.
pub const ITEM_KEY: &str = "_";

/// Named values available to a node's body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataBinding {
    values: OrdMap<String, Value>,
}

impl DataBinding {
    pub fn from_item(item: &Value) -> Self {
        let mut values = match item {
            Value::Map(map) => map.clone(),
            _ => OrdMap::new(),
        };
        values.insert(ITEM_KEY.to_string(), item.clone());
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The raw data-set item this binding was built from.
    pub fn item(&self) -> Option<&Value> {
        self.values.get(ITEM_KEY)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Position of a generated node within its expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expansion {
    pub index: usize,
    pub count: usize,
}

/// One generated sibling: its rendered name, binding and position.
#[derive(Debug, Clone)]
pub struct ExpandedItem {
    pub name: String,
    pub binding: DataBinding,
    pub expansion: Expansion,
}

/// Expands `template` over `data`. An empty data set yields nothing.
pub fn expand(template: &str, data: &[Value]) -> Vec<ExpandedItem> {
    let count = data.len();
    data.iter()
        .enumerate()
        .map(|(index, item)| {
            let binding = DataBinding::from_item(item);
            ExpandedItem {
                name: expand_name(template, &binding),
                binding,
                expansion: Expansion { index, count },
            }
        })
        .collect()
}

/// Replaces `<key>` placeholders with bound values. Unknown placeholders and
/// unbalanced `<` are left untouched.
///
/// ```rust
/// use bramble::tree::expand::{expand_name, DataBinding};
/// use bramble::value::Value;
/// let binding = DataBinding::from_item(&Value::map([("x", 2)]));
/// assert_eq!(expand_name("doubles <x>", &binding), "doubles 2");
/// assert_eq!(expand_name("keeps <y>", &binding), "keeps <y>");
/// ```
pub fn expand_name(template: &str, binding: &DataBinding) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) => {
                let key = after[..close].trim();
                match binding.get(key) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => out.push_str(&rest[open..open + close + 2]),
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_items_expose_keys_and_item() {
        let item = Value::map([("x", 1)]);
        let binding = DataBinding::from_item(&item);
        assert_eq!(binding.get("x"), Some(&Value::from(1)));
        assert_eq!(binding.item(), Some(&item));
        assert_eq!(binding.len(), 2);
    }

    #[test]
    fn scalar_items_bind_only_the_item() {
        let binding = DataBinding::from_item(&Value::from("a"));
        assert_eq!(binding.len(), 1);
        assert_eq!(expand_name("item <_>", &binding), "item a");
    }

    #[test]
    fn expansion_preserves_order_and_count() {
        let data = vec![
            Value::map([("x", 1)]),
            Value::map([("x", 2)]),
            Value::map([("x", 3)]),
        ];
        let items = expand("x is <x>", &data);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["x is 1", "x is 2", "x is 3"]);
        assert!(items.iter().all(|i| i.expansion.count == 3));
        assert_eq!(items[2].expansion.index, 2);
    }

    #[test]
    fn empty_data_set_expands_to_nothing() {
        assert!(expand("anything", &[]).is_empty());
    }

    #[test]
    fn unbalanced_brackets_survive() {
        let binding = DataBinding::from_item(&Value::map([("x", 1)]));
        assert_eq!(expand_name("a < b <x", &binding), "a < b <x");
        assert_eq!(expand_name("<x><x>", &binding), "11");
    }
}
