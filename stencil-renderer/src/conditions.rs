//! Strict-undefined check for `{% if %}` / `{% elif %}` conditions.
//!
//! Tera evaluates an unknown name in a condition as false. With strict
//! undefined variables a job must fail instead, so the job template's
//! conditions are checked against its variables before rendering.
//!
//! A name is exempt when it is the subject of a `defined`/`undefined` test,
//! sits behind a `default` filter, or is bound by the template itself (`set`,
//! loop variables, macro arguments). A `defined` test also vouches for its
//! name in the rest of an `and` chain and inside the branch it opens.

use std::collections::BTreeSet;

use tera::ast::{Expr, ExprVal, LogicOperator, Node};

use stencil_core::Mapping;

/// Always present in a Tera context.
const TERA_CONTEXT: &str = "__tera_context";

#[derive(Debug, Clone, Default)]
struct Scope {
    locals: BTreeSet<String>,
    guarded: BTreeSet<String>,
}

impl Scope {
    fn with_locals(&self, names: impl IntoIterator<Item = String>) -> Scope {
        let mut scope = self.clone();
        scope.locals.extend(names);
        scope
    }

    fn with_guards(&self, paths: impl IntoIterator<Item = String>) -> Scope {
        let mut scope = self.clone();
        scope.guarded.extend(paths);
        scope
    }

    fn exempt(&self, path: &str) -> bool {
        let root = root_name(path);
        root == TERA_CONTEXT
            || self.locals.contains(root)
            || self.guarded.iter().any(|guard| covers(guard, path))
    }
}

/// `a` for `a`, `a.b` and `a[0]`.
fn root_name(path: &str) -> &str {
    path.split(['.', '[']).next().unwrap_or(path)
}

/// `true` when a guard on `guard` also vouches for `path`.
fn covers(guard: &str, path: &str) -> bool {
    match path.strip_prefix(guard) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

/// Follow the dotted `path` through nested mappings. Indexing and attribute
/// access on non-mappings are left for Tera to judge.
fn is_defined(vars: &Mapping, path: &str) -> bool {
    let mut current = Some(vars);
    for segment in path.split('.') {
        let Some(map) = current else {
            return true;
        };
        let key = root_name(segment);
        let Some(value) = map.get(key) else {
            return false;
        };
        if key.len() != segment.len() {
            return true;
        }
        current = value.as_mapping();
    }
    true
}

fn check_path(path: &str, vars: &Mapping, scope: &Scope) -> Option<String> {
    (!scope.exempt(path) && !is_defined(vars, path)).then(|| path.to_string())
}

fn is_definedness_test(name: &str) -> bool {
    matches!(name, "defined" | "undefined")
}

/// Paths that `expr` proves defined when it evaluates to `when_true`.
fn guards(expr: &Expr, when_true: bool) -> Vec<String> {
    let when_true = when_true != expr.negated;
    match &expr.val {
        ExprVal::Test(test) if is_definedness_test(&test.name) => {
            let says_defined = (test.name == "defined") != test.negated;
            if says_defined == when_true {
                vec![test.ident.clone()]
            } else {
                Vec::new()
            }
        }
        ExprVal::Logic(logic) => match (logic.operator, when_true) {
            (LogicOperator::And, true) | (LogicOperator::Or, false) => {
                let mut paths = guards(&logic.lhs, when_true);
                paths.extend(guards(&logic.rhs, when_true));
                paths
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn check_expr(expr: &Expr, vars: &Mapping, scope: &Scope) -> Option<String> {
    if expr.has_default_filter() {
        return None;
    }
    let found = match &expr.val {
        ExprVal::Ident(path) => check_path(path, vars, scope),
        ExprVal::Test(test) => {
            let subject = if is_definedness_test(&test.name) {
                None
            } else {
                check_path(&test.ident, vars, scope)
            };
            subject.or_else(|| test.args.iter().find_map(|arg| check_expr(arg, vars, scope)))
        }
        ExprVal::Logic(logic) => {
            // `and`/`or` short-circuit, so the left side may guard the right.
            let rhs_scope = match logic.operator {
                LogicOperator::And => scope.with_guards(guards(&logic.lhs, true)),
                LogicOperator::Or => scope.with_guards(guards(&logic.lhs, false)),
                _ => scope.clone(),
            };
            check_expr(&logic.lhs, vars, scope)
                .or_else(|| check_expr(&logic.rhs, vars, &rhs_scope))
        }
        ExprVal::Math(math) => {
            check_expr(&math.lhs, vars, scope).or_else(|| check_expr(&math.rhs, vars, scope))
        }
        ExprVal::In(contains) => check_expr(&contains.lhs, vars, scope)
            .or_else(|| check_expr(&contains.rhs, vars, scope)),
        ExprVal::Array(items) => items.iter().find_map(|item| check_expr(item, vars, scope)),
        ExprVal::StringConcat(concat) => concat.values.iter().find_map(|value| match value {
            ExprVal::Ident(path) => check_path(path, vars, scope),
            _ => None,
        }),
        ExprVal::FunctionCall(call) => call.args.values().find_map(|arg| check_expr(arg, vars, scope)),
        ExprVal::MacroCall(call) => call.args.values().find_map(|arg| check_expr(arg, vars, scope)),
        ExprVal::String(_) | ExprVal::Int(_) | ExprVal::Float(_) | ExprVal::Bool(_) => None,
    };
    found.or_else(|| {
        expr.filters
            .iter()
            .flat_map(|filter| filter.args.values())
            .find_map(|arg| check_expr(arg, vars, scope))
    })
}

/// Every name a `{% set %}` or `{% set_global %}` binds, wherever it sits.
fn collect_sets(nodes: &[Node], out: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Set(_, set) => {
                out.insert(set.key.clone());
            }
            Node::If(branches, _) => {
                for (_, _, body) in &branches.conditions {
                    collect_sets(body, out);
                }
                if let Some((_, body)) = &branches.otherwise {
                    collect_sets(body, out);
                }
            }
            Node::Forloop(_, forloop, _) => {
                collect_sets(&forloop.body, out);
                if let Some(body) = &forloop.empty_body {
                    collect_sets(body, out);
                }
            }
            Node::Block(_, block, _) => collect_sets(&block.body, out),
            Node::FilterSection(_, section, _) => collect_sets(&section.body, out),
            Node::MacroDefinition(_, definition, _) => collect_sets(&definition.body, out),
            _ => {}
        }
    }
}

fn walk_nodes(nodes: &[Node], vars: &Mapping, scope: &Scope) -> Option<String> {
    nodes.iter().find_map(|node| walk_node(node, vars, scope))
}

fn walk_node(node: &Node, vars: &Mapping, scope: &Scope) -> Option<String> {
    match node {
        Node::If(branches, _) => {
            // An `elif` or `else` only runs when every earlier condition was false.
            let mut ruled_out = Vec::new();
            for (_, condition, body) in &branches.conditions {
                let here = scope.with_guards(ruled_out.iter().cloned());
                if let Some(name) = check_expr(condition, vars, &here) {
                    return Some(name);
                }
                let inside = here.with_guards(guards(condition, true));
                if let Some(name) = walk_nodes(body, vars, &inside) {
                    return Some(name);
                }
                ruled_out.extend(guards(condition, false));
            }
            let (_, body) = branches.otherwise.as_ref()?;
            walk_nodes(body, vars, &scope.with_guards(ruled_out))
        }
        Node::Forloop(_, forloop, _) => {
            let bound = forloop
                .key
                .iter()
                .cloned()
                .chain([forloop.value.clone(), "loop".to_string()]);
            walk_nodes(&forloop.body, vars, &scope.with_locals(bound)).or_else(|| {
                forloop.empty_body.as_deref().and_then(|body| walk_nodes(body, vars, scope))
            })
        }
        Node::MacroDefinition(_, definition, _) => {
            walk_nodes(&definition.body, vars, &scope.with_locals(definition.args.keys().cloned()))
        }
        Node::Block(_, block, _) => walk_nodes(&block.body, vars, scope),
        Node::FilterSection(_, section, _) => walk_nodes(&section.body, vars, scope),
        _ => None,
    }
}

/// The first name used in a condition of `ast` that `vars` does not define.
pub(crate) fn undefined_in_conditions(ast: &[Node], vars: &Mapping) -> Option<String> {
    let mut scope = Scope::default();
    collect_sets(ast, &mut scope.locals);
    walk_nodes(ast, vars, &scope)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stencil_core::Value;
    use tera::Tera;

    fn vars() -> Mapping {
        let mut server = Mapping::new();
        server.insert("host".into(), Value::from("web01"));
        let mut vars = Mapping::new();
        vars.insert("server".into(), Value::Mapping(server));
        vars.insert("items".into(), Value::Sequence(vec![Value::Int(1)]));
        vars.insert("flag".into(), Value::Bool(true));
        vars
    }

    fn undefined(text: &str) -> Option<String> {
        let mut tera = Tera::default();
        tera.add_raw_template("t", text).unwrap();
        let template = tera.get_template("t").unwrap();
        undefined_in_conditions(&template.ast, &vars())
    }

    #[rstest]
    #[case("{% if tpyo_flag %}on{% endif %}", "tpyo_flag")]
    #[case("{% if flag %}{% elif nope %}{% endif %}", "nope")]
    #[case("{% if not missing %}x{% endif %}", "missing")]
    #[case("{% if flag and other > 1 %}x{% endif %}", "other")]
    #[case("{% if server.port %}x{% endif %}", "server.port")]
    #[case("{% for i in items %}{% if i and stray %}x{% endif %}{% endfor %}", "stray")]
    #[case("{% filter upper %}{% if hidden %}x{% endif %}{% endfilter %}", "hidden")]
    #[case("{% if x is defined %}{% elif x.on %}{% endif %}", "x.on")]
    fn flags_undefined_names(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(undefined(text).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("{% if flag %}x{% elif server.host %}y{% endif %}")]
    #[case("{% if x is defined %}x{% endif %}")]
    #[case("{% if x is not defined %}x{% endif %}")]
    #[case("{% if x is undefined %}x{% endif %}")]
    #[case("{% if x | default(value=false) %}x{% endif %}")]
    #[case("{% if x is defined and x.enabled %}x{% endif %}")]
    #[case("{% if x is undefined or x.enabled %}x{% endif %}")]
    #[case("{% if x is defined %}{% if x.on %}x{% endif %}{% endif %}")]
    #[case("{% if x is undefined %}a{% elif x.on %}b{% else %}{% if x %}c{% endif %}{% endif %}")]
    #[case("{% for k, v in server %}{% if v and loop.first and k %}x{% endif %}{% endfor %}")]
    #[case("{% set local = 1 %}{% if local %}x{% endif %}")]
    #[case("{% if items.0 %}x{% endif %}")]
    #[case("{% if __tera_context %}x{% endif %}")]
    #[case("{{ not_a_condition }}")]
    fn allows_defined_or_bound_names(#[case] text: &str) {
        assert_eq!(undefined(text), None);
    }

    #[test]
    fn macro_arguments_are_bound() {
        let text = "{% macro m(arg) %}{% if arg %}x{% endif %}{% endmacro m %}";
        assert_eq!(undefined(text), None);
    }

    #[test]
    fn guards_cover_paths_below_them() {
        assert!(covers("x", "x.y"));
        assert!(covers("x", "x[0]"));
        assert!(!covers("x", "xy"));
        assert_eq!(root_name("a.b[1]"), "a");
    }
}
