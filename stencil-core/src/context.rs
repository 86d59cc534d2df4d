//! Lowest-priority variable sources: built-in context and the environment.

use std::path::Path;

use chrono::{DateTime, Local};

use crate::coerce::coerce;
use crate::value::{Mapping, Value};

/// Built-in variables describing the run, timestamped now.
pub fn builtin_context(output_dir: Option<&Path>) -> Mapping {
    builtin_context_at(Local::now(), output_dir)
}

/// Built-in variables with an explicit timestamp.
pub fn builtin_context_at(now: DateTime<Local>, output_dir: Option<&Path>) -> Mapping {
    let mut ctx = Mapping::new();
    ctx.insert("__stencil_version__".into(), env!("CARGO_PKG_VERSION").into());

    match std::env::var("USER").or_else(|_| std::env::var("USERNAME")) {
        Ok(user) => {
            ctx.insert("__user__".into(), user.into());
        }
        Err(_) => tracing::debug!("no USER in environment; __user__ left undefined"),
    }

    ctx.insert("__pid__".into(), Value::Int(i64::from(std::process::id())));
    #[cfg(unix)]
    ctx.insert(
        "__ppid__".into(),
        Value::Int(i64::from(std::os::unix::process::parent_id())),
    );

    if let Ok(cwd) = std::env::current_dir() {
        ctx.insert("__working_directory__".into(), cwd.display().to_string().into());
    }
    if let Some(dir) = output_dir {
        ctx.insert("__output_directory__".into(), dir.display().to_string().into());
    }

    ctx.insert("__date__".into(), now.format("%d-%m-%Y").to_string().into());
    ctx.insert("__date_inv__".into(), now.format("%Y-%m-%d").to_string().into());
    ctx.insert("__time__".into(), now.format("%H:%M:%S").to_string().into());
    ctx.insert("__datetime__".into(), now.format("%Y-%m-%d %H:%M:%S").to_string().into());
    ctx
}

/// Environment variables as a mapping of coerced values.
///
/// With a `prefix`, only names starting with it are kept and the prefix is
/// removed from the key.
pub fn environment_variables<I>(vars: I, prefix: Option<&str>) -> Mapping
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let key = match prefix {
                Some(prefix) => name.strip_prefix(prefix)?.to_string(),
                None => name,
            };
            (!key.is_empty()).then(|| (key, coerce(&value)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_are_formatted() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let ctx = builtin_context_at(now, Some(Path::new("/out")));
        assert_eq!(ctx["__date__"], Value::from("09-03-2024"));
        assert_eq!(ctx["__date_inv__"], Value::from("2024-03-09"));
        assert_eq!(ctx["__time__"], Value::from("14:05:07"));
        assert_eq!(ctx["__datetime__"], Value::from("2024-03-09 14:05:07"));
        assert_eq!(ctx["__output_directory__"], Value::from("/out"));
        assert!(matches!(ctx["__pid__"], Value::Int(_)));
    }

    #[test]
    fn environment_prefix_filters_and_strips() {
        let vars = vec![
            ("APP_PORT".to_string(), "8080".to_string()),
            ("APP_NAME".to_string(), "demo".to_string()),
            ("HOME".to_string(), "/home/x".to_string()),
            ("APP_".to_string(), "empty".to_string()),
        ];
        let map = environment_variables(vars, Some("APP_"));
        assert_eq!(map.len(), 2);
        assert_eq!(map["PORT"], Value::Int(8080));
        assert_eq!(map["NAME"], Value::from("demo"));
    }

    #[test]
    fn environment_without_prefix_keeps_everything() {
        let vars = vec![("A".to_string(), "True".to_string())];
        let map = environment_variables(vars, None);
        assert_eq!(map["A"], Value::Bool(true));
    }
}
