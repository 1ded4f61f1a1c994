#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// Legacy front-end tree: a string id, named children and positional operands.
///
/// This is the only string-tagged structure in the workspace; it is consumed
/// by [`crate::Migrator`] and never travels further.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Irep {
    pub id: String,
    pub named: BTreeMap<String, Irep>,
    pub sub: Vec<Irep>,
}

impl Irep {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            named: BTreeMap::new(),
            sub: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Irep) -> Self {
        self.named.insert(key.into(), value);
        self
    }

    /// Shorthand for a named child that only carries an id (`width`, `tag`, ...).
    pub fn with_str(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(key, Irep::new(value))
    }

    pub fn with_type(self, ty: Irep) -> Self {
        self.with("type", ty)
    }

    pub fn with_operands(mut self, ops: Vec<Irep>) -> Self {
        self.sub = ops;
        self
    }

    pub fn push(mut self, op: Irep) -> Self {
        self.sub.push(op);
        self
    }

    pub fn find(&self, key: &str) -> Option<&Irep> {
        self.named.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.named.get(key).map(|n| n.id.as_str())
    }

    pub fn ty(&self) -> Option<&Irep> {
        self.find("type")
    }

    pub fn operands(&self) -> &[Irep] {
        &self.sub
    }

    pub fn op(&self, i: usize) -> Option<&Irep> {
        self.sub.get(i)
    }
}

/// Operators the front end emits with more than two operands.
pub const ASSOCIATIVE_IDS: &[&str] = &[
    "and", "or", "bitand", "bitor", "bitxor", "bitnand", "bitnor", "bitnxor", "lshr", "+", "-", "*",
];

pub fn is_associative(id: &str) -> bool {
    ASSOCIATIVE_IDS.contains(&id)
}

/// Splits one n-ary node into `(first n-1 operands) op last`, keeping the
/// node's named children (its type in particular) on both levels.
pub fn peel_last(node: &Irep) -> Irep {
    debug_assert!(node.sub.len() > 2);
    let mut rest = node.clone();
    let last = rest.sub.pop().unwrap_or_default();

    let mut two = node.clone();
    two.sub = vec![rest, last];
    two
}

/// Re-associates every n-ary associative operator into binary form.
///
/// The last operand is peeled first and the remainder is normalized
/// recursively, so `a + b + c + d` becomes `((a + b) + c) + d`.
pub fn normalize(node: &Irep) -> Irep {
    if is_associative(&node.id) && node.sub.len() > 2 {
        let two = peel_last(node);
        let lhs = normalize(&two.sub[0]);
        let rhs = normalize(&two.sub[1]);
        return Irep {
            id: two.id,
            named: two.named,
            sub: vec![lhs, rhs],
        };
    }

    Irep {
        id: node.id.clone(),
        named: node.named.clone(),
        sub: node.sub.iter().map(normalize).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Irep {
        Irep::new("symbol").with_str("identifier", name)
    }

    fn name_of(n: &Irep) -> &str {
        n.get_str("identifier").unwrap_or("?")
    }

    #[test]
    fn three_operands_peel_last() {
        let sum = Irep::new("+").with_operands(vec![sym("a"), sym("b"), sym("c")]);
        let n = normalize(&sum);

        assert_eq!(n.sub.len(), 2);
        assert_eq!(name_of(&n.sub[1]), "c");
        let inner = &n.sub[0];
        assert_eq!(inner.id, "+");
        assert_eq!(name_of(&inner.sub[0]), "a");
        assert_eq!(name_of(&inner.sub[1]), "b");
    }

    #[test]
    fn binary_nodes_untouched() {
        let sum = Irep::new("+").with_operands(vec![sym("a"), sym("b")]);
        assert_eq!(normalize(&sum), sum);

        // Division is never re-associated, even if malformed.
        let div = Irep::new("/").with_operands(vec![sym("a"), sym("b"), sym("c")]);
        assert_eq!(normalize(&div).sub.len(), 3);
    }

    #[test]
    fn nested_operands_are_normalized() {
        let inner = Irep::new("and").with_operands(vec![sym("p"), sym("q"), sym("r")]);
        let outer = Irep::new("not").with_operands(vec![inner]);
        let n = normalize(&outer);
        assert_eq!(n.sub[0].sub.len(), 2);
        assert_eq!(n.sub[0].sub[0].sub.len(), 2);
    }
}
