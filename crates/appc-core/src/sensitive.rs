//! C14: Sensitive-path analyzer. Walks a schema's struct tree lazily,
//! computing the list of JSON paths marked `encore:"sensitive"` only when a
//! caller actually asks for them (spec.md §4.14 — this table is rarely
//! read, one endpoint's request/response at a time, so it is not computed
//! eagerly for every decl in the schema table).

use crate::schema::{SchemaTable, Type};

/// A dotted JSON path, e.g. `"user.email"` or `"items[].ssn"` for fields
/// nested inside a list.
pub type JsonPath = String;

/// Computes every sensitive JSON path reachable from `ty`, expanding named
/// decls through `table`. Cycles through recursive types are broken by
/// tracking visited decl ids; a decl visited a second time contributes no
/// further paths (its sensitive fields were already recorded on the first
/// visit, and a cyclic struct can't add new distinct paths beyond the
/// nesting depth already seen).
#[must_use]
pub fn sensitive_paths(table: &SchemaTable, ty: &Type) -> Vec<JsonPath> {
    let mut out = Vec::new();
    let mut visiting = Vec::new();
    walk(table, ty, String::new(), &mut visiting, &mut out);
    out
}

fn walk(table: &SchemaTable, ty: &Type, prefix: String, visiting: &mut Vec<u32>, out: &mut Vec<JsonPath>) {
    match ty {
        Type::Struct { fields } => {
            for field in fields {
                let Some(json_name) = &field.json_name else { continue };
                let path = if prefix.is_empty() {
                    json_name.clone()
                } else {
                    format!("{prefix}.{json_name}")
                };
                if field.sensitive {
                    out.push(path.clone());
                }
                walk(table, &field.ty, path, visiting, out);
            }
        }
        Type::List(elem) => walk(table, elem, format!("{prefix}[]"), visiting, out),
        Type::Map(_, value) => walk(table, value, format!("{prefix}[]"), visiting, out),
        Type::Pointer(inner) => walk(table, inner, prefix, visiting, out),
        Type::ConfigWrapper { elem, .. } => walk(table, elem, prefix, visiting, out),
        Type::Named { decl, .. } => {
            if visiting.contains(decl) {
                return;
            }
            visiting.push(*decl);
            if let Some(root) = table.get(*decl).root.clone() {
                walk(table, &root, prefix, visiting, out);
            }
            visiting.pop();
        }
        Type::Builtin(_) | Type::TypeParamRef { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Builtin, Field};

    fn field(name: &str, json: &str, ty: Type, sensitive: bool) -> Field {
        Field {
            name: name.to_string(),
            doc: None,
            ty,
            optional: false,
            raw_tag: None,
            json_name: Some(json.to_string()),
            query_name: None,
            header_name: None,
            sensitive,
        }
    }

    #[test]
    fn finds_top_level_sensitive_field() {
        let table = SchemaTable::new();
        let ty = Type::Struct {
            fields: vec![field("Email", "email", Type::Builtin(Builtin::String), true)],
        };
        let paths = sensitive_paths(&table, &ty);
        assert_eq!(paths, vec!["email".to_string()]);
    }

    #[test]
    fn finds_nested_list_sensitive_field() {
        let table = SchemaTable::new();
        let inner = Type::Struct {
            fields: vec![field("Ssn", "ssn", Type::Builtin(Builtin::String), true)],
        };
        let ty = Type::Struct {
            fields: vec![field("Items", "items", Type::List(Box::new(inner)), false)],
        };
        let paths = sensitive_paths(&table, &ty);
        assert_eq!(paths, vec!["items[].ssn".to_string()]);
    }

    #[test]
    fn recursive_named_type_does_not_infinite_loop() {
        let mut table = SchemaTable::new();
        let (decl_id, _) = table.reserve("app", "Node", None, crate::source::Position::new(0, 0, 1, 1), Vec::new());
        let root = Type::Struct {
            fields: vec![
                field("Secret", "secret", Type::Builtin(Builtin::String), true),
                Field {
                    name: "Next".to_string(),
                    doc: None,
                    ty: Type::Pointer(Box::new(Type::Named { decl: decl_id, type_args: vec![] })),
                    optional: true,
                    raw_tag: None,
                    json_name: Some("next".to_string()),
                    query_name: None,
                    header_name: None,
                    sensitive: false,
                },
            ],
        };
        table.set_root(decl_id, root);
        let paths = sensitive_paths(&table, &Type::Named { decl: decl_id, type_args: vec![] });
        assert_eq!(paths, vec!["secret".to_string()]);
    }
}
