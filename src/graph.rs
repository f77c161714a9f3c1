//! # 推导图
//!
//! 每个目标键声明若干候选规则，规则列出依赖键与推导函数。
//! 求值时：已知值直接返回；否则按声明顺序尝试规则，依赖全部可解时才调用，
//! 取第一个非空结果。每次求值内结果缓存，成环时报错而不是无限递归。

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{Error, Result};

type Derive<V, C> = Box<dyn Fn(&mut C, &[V]) -> Option<V>>;

struct Rule<K, V, C> {
    target: K,
    deps: Vec<K>,
    derive: Derive<V, C>,
}

pub struct Graph<K, V, C> {
    rules: Vec<Rule<K, V, C>>,
}

impl<K, V, C> Graph<K, V, C>
where
    K: Copy + Eq + Hash + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// 为 `target` 追加一条规则；同一目标的规则按追加顺序尝试
    pub fn rule<F>(&mut self, target: K, deps: &[K], derive: F) -> &mut Self
    where
        F: Fn(&mut C, &[V]) -> Option<V> + 'static,
    {
        self.rules.push(Rule { target, deps: deps.to_vec(), derive: Box::new(derive) });
        self
    }

    #[cfg(test)]
    fn has_rules(&self, target: K) -> bool {
        self.rules.iter().any(|r| r.target == target)
    }

    /// 以一组已知值开始一次求值
    pub fn evaluate(&self, known: HashMap<K, V>) -> Evaluation<'_, K, V, C> {
        Evaluation { graph: self, known, memo: HashMap::new(), active: Vec::new() }
    }
}

impl<K, V, C> Default for Graph<K, V, C>
where
    K: Copy + Eq + Hash + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// 一次求值的状态：已知值、缓存、当前递归链
pub struct Evaluation<'g, K, V, C> {
    graph: &'g Graph<K, V, C>,
    known: HashMap<K, V>,
    memo: HashMap<K, Option<V>>,
    active: Vec<K>,
}

impl<K, V, C> Evaluation<'_, K, V, C>
where
    K: Copy + Eq + Hash + Debug,
    V: Clone,
{
    pub fn resolve(&mut self, ctx: &mut C, key: K) -> Result<Option<V>> {
        if let Some(value) = self.known.get(&key) {
            return Ok(Some(value.clone()));
        }
        if let Some(cached) = self.memo.get(&key) {
            return Ok(cached.clone());
        }
        if self.active.contains(&key) {
            let chain: Vec<String> = self
                .active
                .iter()
                .chain(std::iter::once(&key))
                .map(|k| format!("{:?}", k))
                .collect();
            return Err(Error::Cycle(chain.join(" → ")));
        }

        self.active.push(key);
        let result = self.apply_rules(ctx, key);
        self.active.pop();

        let value = result?;
        self.memo.insert(key, value.clone());
        Ok(value)
    }

    fn apply_rules(&mut self, ctx: &mut C, key: K) -> Result<Option<V>> {
        let graph = self.graph;
        'rules: for rule in graph.rules.iter().filter(|r| r.target == key) {
            let mut inputs = Vec::with_capacity(rule.deps.len());
            for dep in &rule.deps {
                match self.resolve(ctx, *dep)? {
                    Some(v) => inputs.push(v),
                    None => continue 'rules,
                }
            }
            if let Some(value) = (rule.derive)(ctx, &inputs) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// 是否已求过（或已知）
    #[cfg(test)]
    fn is_settled(&self, key: K) -> bool {
        self.known.contains_key(&key) || self.memo.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        A,
        B,
        C,
        D,
    }

    /// 记录每条规则被调用的次数
    #[derive(Default)]
    struct Calls(Vec<&'static str>);

    fn graph() -> Graph<Key, String, Calls> {
        let mut g: Graph<Key, String, Calls> = Graph::new();
        g.rule(Key::B, &[Key::A], |calls: &mut Calls, v: &[String]| {
            calls.0.push("b<-a");
            Some(format!("b({})", v[0]))
        })
        .rule(Key::C, &[Key::D], |calls: &mut Calls, v: &[String]| {
            calls.0.push("c<-d");
            Some(format!("c({})", v[0]))
        })
        .rule(Key::C, &[Key::B], |calls: &mut Calls, v: &[String]| {
            calls.0.push("c<-b");
            Some(format!("c({})", v[0]))
        })
        .rule(Key::D, &[Key::B, Key::C], |calls: &mut Calls, _: &[String]| {
            calls.0.push("d<-bc");
            None
        });
        g
    }

    #[test]
    fn test_cycle_through_first_rule() {
        let g = graph();
        let mut calls = Calls::default();
        let mut eval = g.evaluate(HashMap::from([(Key::A, "a".to_string())]));
        // C 的第一条规则依赖 D，D 又依赖 C，成环
        assert!(matches!(eval.resolve(&mut calls, Key::C), Err(Error::Cycle(_))));
    }

    #[test]
    fn test_known_value_wins() {
        let g = graph();
        let mut calls = Calls::default();
        let mut eval = g.evaluate(HashMap::from([(Key::B, "given".to_string())]));
        assert_eq!(eval.resolve(&mut calls, Key::B).unwrap(), Some("given".to_string()));
        assert!(calls.0.is_empty());
    }

    #[test]
    fn test_memoized() {
        let mut g: Graph<Key, String, Calls> = Graph::new();
        g.rule(Key::B, &[Key::A], |calls: &mut Calls, v: &[String]| {
            calls.0.push("b<-a");
            Some(format!("b({})", v[0]))
        })
        .rule(Key::C, &[Key::B], |_: &mut Calls, v: &[String]| Some(format!("c({})", v[0])))
        .rule(Key::D, &[Key::B, Key::C], |_: &mut Calls, v: &[String]| Some(v.join("+")));

        let mut calls = Calls::default();
        let mut eval = g.evaluate(HashMap::from([(Key::A, "a".to_string())]));
        assert_eq!(eval.resolve(&mut calls, Key::D).unwrap(), Some("b(a)+c(b(a))".to_string()));
        assert_eq!(eval.resolve(&mut calls, Key::C).unwrap(), Some("c(b(a))".to_string()));
        assert_eq!(calls.0, vec!["b<-a"]);
        assert!(eval.is_settled(Key::B));
    }

    #[test]
    fn test_rule_order_and_fallback() {
        let mut g: Graph<Key, String, Calls> = Graph::new();
        g.rule(Key::C, &[Key::D], |_: &mut Calls, v: &[String]| Some(format!("from d {}", v[0])))
            .rule(Key::C, &[Key::A], |_: &mut Calls, _: &[String]| None)
            .rule(Key::C, &[Key::B], |_: &mut Calls, v: &[String]| Some(format!("from b {}", v[0])));

        let mut calls = Calls::default();
        // D 无规则，A 的规则返回空，落到 B
        let mut eval = g.evaluate(HashMap::from([
            (Key::A, "a".to_string()),
            (Key::B, "b".to_string()),
        ]));
        assert_eq!(eval.resolve(&mut calls, Key::C).unwrap(), Some("from b b".to_string()));

        let mut eval = g.evaluate(HashMap::from([
            (Key::B, "b".to_string()),
            (Key::D, "d".to_string()),
        ]));
        assert_eq!(eval.resolve(&mut calls, Key::C).unwrap(), Some("from d d".to_string()));
    }

    #[test]
    fn test_unresolvable() {
        let g = graph();
        let mut calls = Calls::default();
        let mut eval = g.evaluate(HashMap::new());
        assert_eq!(eval.resolve(&mut calls, Key::B).unwrap(), None);
        assert_eq!(eval.resolve(&mut calls, Key::A).unwrap(), None);
        assert!(calls.0.is_empty());
        assert!(g.has_rules(Key::D));
        assert!(!g.has_rules(Key::A));
    }

    #[test]
    fn test_cycle_reports_chain() {
        let mut g: Graph<Key, String, Calls> = Graph::new();
        g.rule(Key::A, &[Key::B], |_, v| Some(v[0].clone()))
            .rule(Key::B, &[Key::A], |_, v| Some(v[0].clone()));
        let mut calls = Calls::default();
        let mut eval = g.evaluate(HashMap::new());
        match eval.resolve(&mut calls, Key::A) {
            Err(Error::Cycle(chain)) => assert_eq!(chain, "A → B → A"),
            other => panic!("expected cycle, got {:?}", other),
        }
        // 成环后状态可继续使用
        assert!(!eval.is_settled(Key::A));
    }
}
